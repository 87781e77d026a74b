//! # Upscaling Engine Facade
//!
//! The only surface the host touches. Owns the configuration, composes the
//! planner, accountant, model loader and render chain, and drives the
//! per-frame loop against the host's display clock.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --initialize()--> Initializing --> Ready
//! Ready --start()--> Upscaling --stop()--> Stopped --start()--> Upscaling ...
//! any state --destroy()--> (resources released, idempotent)
//! Failed: terminal, entered when no rendering surface can be acquired
//! ```
//!
//! The loop is single-threaded and cooperative: it yields to the host
//! scheduler between frames and resumes on the next display callback. The
//! engine never spawns a thread. Cancellation is checked at the top of
//! every iteration, so `stop()` takes effect before the next frame runs.
//! Nothing inside the loop ever propagates an error to the host; failures
//! degrade the strategy or skip the frame and show up in the stats.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sp_scale::tiers::{detect_target, optimal_source, Size, Tier};
use tracing::{debug, info, warn};

use crate::config::{DisplayGeometry, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::host::{BitrateSink, FrameClock, FrameSink, FrameSource};
use crate::model::{self, SrModel};
use crate::render::{ai::AiRenderer, cpu::CpuRenderer, gpu::GpuRenderer};
use crate::render::{select_strategies, FrameRenderer, RendererChain, Strategy};
use crate::stats::{BandwidthAccountant, StatsCell, UpscalingStats};

/// Engine lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Initializing,
    Ready,
    Upscaling,
    Stopped,
    /// Terminal: no rendering surface could be acquired at all.
    Failed,
}

impl EngineState {
    pub fn name(self) -> &'static str {
        match self {
            EngineState::Idle => "Idle",
            EngineState::Initializing => "Initializing",
            EngineState::Ready => "Ready",
            EngineState::Upscaling => "Upscaling",
            EngineState::Stopped => "Stopped",
            EngineState::Failed => "Failed",
        }
    }
}

/// Clonable handle that cancels a running loop from outside the engine
/// borrow. Takes effect before the next scheduled frame executes.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Per-session plan computed once at `start()`.
struct SessionPlan {
    target: Tier,
    source: Tier,
    target_size: Size,
}

/// The client-side adaptive upscaling engine.
///
/// One instance per player; instances are independent and never share
/// state, so multiple players (or tests) can run side by side.
pub struct UpscalingEngine {
    config: EngineConfig,
    display: DisplayGeometry,
    state: EngineState,
    destroyed: bool,

    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    clock: Box<dyn FrameClock>,
    bitrate_sink: Option<Box<dyn BitrateSink>>,

    model: Option<Arc<SrModel>>,
    chain: Option<RendererChain>,
    plan: Option<SessionPlan>,

    stats: Arc<StatsCell>,
    accountant: Option<BandwidthAccountant>,
    last_tick: Option<Instant>,
    stop_flag: Arc<AtomicBool>,
}

impl UpscalingEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Which strategy is rendering right now, if a session is live.
    pub fn active_strategy(&self) -> Option<Strategy> {
        self.chain.as_ref().map(|c| c.active_strategy())
    }

    /// Read-only stats snapshot. Safe to call from any state at any time.
    pub fn stats(&self) -> UpscalingStats {
        self.stats.snapshot()
    }

    /// The `(source, target)` tier pair planned at `start()`, while a
    /// session plan exists.
    pub fn tier_plan(&self) -> Option<(Tier, Tier)> {
        self.plan.as_ref().map(|p| (p.source, p.target))
    }

    /// Handle for cancelling `run()` from outside the engine borrow.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop_flag),
        }
    }

    /// Load the optional model and become `Ready`. Must be called exactly
    /// once, before `start()`. Model loading is the only asynchronous,
    /// non-blocking setup step and is never retried mid-session.
    pub async fn initialize(&mut self) -> EngineResult<()> {
        if self.destroyed {
            return Err(EngineError::state(
                self.state.name(),
                "initialize",
                "the engine has been destroyed; build a new instance",
            ));
        }
        if self.state != EngineState::Idle {
            return Err(EngineError::state(
                self.state.name(),
                "initialize",
                "initialize() is only valid once, from Idle",
            ));
        }
        self.state = EngineState::Initializing;

        if self.config.enable_upscaling {
            self.model = model::load(&self.config).await;
        } else {
            debug!("upscaling disabled by configuration; skipping model load");
        }

        self.state = EngineState::Ready;
        info!(
            quality = ?self.config.quality,
            model = self.model.as_ref().map(|m| m.asset).unwrap_or("none"),
            "engine initialized"
        );
        Ok(())
    }

    /// Begin an upscaling session: plan the tiers once, acquire the output
    /// surface, pick the render strategy, signal the ABR player, reset the
    /// stats and enter the frame loop state.
    pub async fn start(&mut self) -> EngineResult<()> {
        // A destroyed engine has released its sink and detached its source;
        // it must never re-enter the frame loop.
        if self.destroyed {
            return Err(EngineError::state(
                self.state.name(),
                "start",
                "the engine has been destroyed; build a new instance",
            ));
        }
        match self.state {
            EngineState::Ready | EngineState::Stopped => {}
            other => {
                return Err(EngineError::state(
                    other.name(),
                    "start",
                    "start() requires Ready or Stopped",
                ));
            }
        }
        if !self.config.enable_upscaling {
            return Err(EngineError::config(
                "enable_upscaling",
                "upscaling is disabled; the host should keep playing the raw video",
            ));
        }

        let target = detect_target(
            self.config.target_resolution.as_explicit(),
            self.display.width,
            self.display.height,
            self.display.device_pixel_ratio,
        );
        let source = if self.config.bandwidth_savings {
            optimal_source(target)
        } else {
            target
        };
        let target_size = target.size();

        // The one unrecoverable failure: without a surface there is nothing
        // to draw into, ever.
        if let Err(err) = self.sink.acquire(target_size).await {
            self.state = EngineState::Failed;
            warn!(error = %err, "output surface unavailable; engine failed");
            return Err(err);
        }

        self.chain = Some(self.build_chain(target_size).await?);

        // Fire-and-forget; the external ABR player honors it best-effort
        // and the engine neither blocks on nor verifies the outcome.
        if self.config.bandwidth_savings {
            if let Some(sink) = &self.bitrate_sink {
                sink.request_tier(source);
                debug!(tier = source.name(), "requested delivery tier from ABR player");
            }
        }

        let accountant = if self.config.bandwidth_savings {
            BandwidthAccountant::new(source, target)
        } else {
            BandwidthAccountant::inert(target)
        };
        self.stats.replace(UpscalingStats {
            original_resolution: source.name().to_string(),
            target_resolution: target.name().to_string(),
            frame_rate: self.clock.refresh_rate(),
            savings_percentage: accountant.savings().percentage,
            active_strategy: self.chain.as_ref().map(|c| c.active_strategy()),
            ..UpscalingStats::default()
        });

        self.accountant = Some(accountant);
        self.plan = Some(SessionPlan {
            target,
            source,
            target_size,
        });
        self.last_tick = None;
        self.stop_flag.store(false, Ordering::SeqCst);
        self.state = EngineState::Upscaling;

        info!(
            target = target.name(),
            source = source.name(),
            strategy = self
                .active_strategy()
                .map(|s| s.name())
                .unwrap_or("none"),
            "upscaling session started"
        );
        Ok(())
    }

    /// Strategy selection, once per session. The ordering decision itself
    /// is [`select_strategies`]; this only probes the hardware and builds
    /// the chosen renderers.
    async fn build_chain(&mut self, target_size: Size) -> EngineResult<RendererChain> {
        let mut gpu = if self.config.gpu_acceleration {
            match GpuRenderer::new(target_size).await {
                Ok(gpu) => Some(gpu),
                Err(err) => {
                    debug!(error = %err, "GPU unavailable; shader tier skipped");
                    None
                }
            }
        } else {
            None
        };

        let order = select_strategies(
            self.config.quality.prefers_ai(),
            self.model.is_some(),
            gpu.is_some(),
        );
        let mut renderers: Vec<Box<dyn FrameRenderer>> = Vec::with_capacity(order.len());
        for strategy in order {
            match strategy {
                Strategy::Ai => {
                    if let Some(model) = &self.model {
                        renderers.push(Box::new(AiRenderer::new(Arc::clone(model))));
                    }
                }
                Strategy::Gpu => {
                    if let Some(gpu) = gpu.take() {
                        renderers.push(Box::new(gpu));
                    }
                }
                Strategy::Cpu => renderers.push(Box::new(CpuRenderer::new())),
            }
        }

        RendererChain::new(renderers)
    }

    /// One loop iteration, to be driven by the host's per-frame callback.
    ///
    /// Returns `true` when a frame was rendered and presented. A `false`
    /// return means the iteration was skipped (not upscaling, cancelled,
    /// no frame available, or an absorbed render/present failure) — never
    /// an error the host must handle.
    pub async fn on_frame(&mut self) -> bool {
        // Cancellation is checked here, at the top of every iteration.
        if self.state != EngineState::Upscaling || self.stop_flag.load(Ordering::SeqCst) {
            return false;
        }
        let Some(plan) = &self.plan else {
            return false;
        };
        let target_size = plan.target_size;

        let Some(frame) = self.source.sample_frame().await else {
            self.record_skip();
            return false;
        };
        if !frame.is_well_formed() {
            self.record_skip();
            return false;
        }

        let started = Instant::now();
        let Some(chain) = self.chain.as_mut() else {
            return false;
        };
        let rendered = match chain.render(&frame, target_size) {
            Ok(out) => out,
            Err(err) => {
                // Transient by policy: skip the frame, keep the loop alive.
                debug!(error = %err, "frame render failed; skipping iteration");
                self.record_skip();
                return false;
            }
        };
        if let Err(err) = self.sink.present_frame(&rendered).await {
            debug!(error = %err, "frame present failed; skipping iteration");
            self.record_skip();
            return false;
        }
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let now = Instant::now();
        let elapsed = self
            .last_tick
            .map(|t| now.duration_since(t))
            .unwrap_or_default();
        self.last_tick = Some(now);

        let total_mb = match self.accountant.as_mut() {
            Some(accountant) => accountant.accumulate(elapsed),
            None => 0.0,
        };

        // Whole-snapshot replacement: readers never see a torn update.
        let mut next = self.stats.snapshot();
        next.bandwidth_saved_mb = total_mb;
        next.upscaling_latency_ms = latency_ms;
        next.frames_rendered += 1;
        next.downgrades = self.chain.as_ref().map(|c| c.downgrades()).unwrap_or(0);
        next.active_strategy = self.active_strategy();
        self.stats.replace(next);
        true
    }

    /// Convenience loop: drive `on_frame()` off the host clock until
    /// stopped. Yields to the host scheduler at every tick; there is no
    /// blocking wait anywhere in the loop.
    pub async fn run(&mut self) -> EngineResult<()> {
        if self.state != EngineState::Upscaling {
            return Err(EngineError::state(
                self.state.name(),
                "run",
                "run() requires a started session",
            ));
        }
        loop {
            if self.stop_flag.load(Ordering::SeqCst) || self.state != EngineState::Upscaling {
                break;
            }
            self.clock.next_frame().await;
            self.on_frame().await;
        }
        if self.state == EngineState::Upscaling {
            self.state = EngineState::Stopped;
        }
        Ok(())
    }

    /// Leave the frame loop. Idempotent; accumulated stats stay readable.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if self.state == EngineState::Upscaling {
            self.state = EngineState::Stopped;
            info!(
                frames = self.stats.snapshot().frames_rendered,
                "upscaling session stopped"
            );
        }
    }

    /// Release everything: stop the loop, release the surface, detach from
    /// the source, dispose the model. Valid from any state, idempotent.
    pub async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        self.sink.release().await;
        self.source.detach().await;
        self.chain = None;
        self.model = None;
        self.plan = None;
        self.accountant = None;
        if self.state != EngineState::Failed {
            self.state = EngineState::Stopped;
        }
        self.destroyed = true;
        debug!("engine destroyed");
    }

    fn record_skip(&self) {
        let mut next = self.stats.snapshot();
        next.frames_skipped += 1;
        next.downgrades = self.chain.as_ref().map(|c| c.downgrades()).unwrap_or(0);
        next.active_strategy = self.active_strategy();
        self.stats.replace(next);
    }
}

/// Builder for the engine, in the crate's usual fluent style. The source,
/// sink and clock adapters are required; everything else has defaults.
pub struct EngineBuilder {
    config: EngineConfig,
    display: Option<DisplayGeometry>,
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn FrameSink>>,
    clock: Option<Box<dyn FrameClock>>,
    bitrate_sink: Option<Box<dyn BitrateSink>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            display: None,
            source: None,
            sink: None,
            clock: None,
            bitrate_sink: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn display(mut self, display: DisplayGeometry) -> Self {
        self.display = Some(display);
        self
    }

    pub fn source<S: FrameSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn sink<S: FrameSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn clock<C: FrameClock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn bitrate_sink<B: BitrateSink + 'static>(mut self, sink: B) -> Self {
        self.bitrate_sink = Some(Box::new(sink));
        self
    }

    /// Validate configuration and assemble the engine. This is the only
    /// synchronous error surface the host must handle.
    pub fn build(self) -> EngineResult<UpscalingEngine> {
        self.config.validate()?;
        let display = self
            .display
            .ok_or_else(|| EngineError::config("display", "display geometry is required"))?;
        let source = self
            .source
            .ok_or_else(|| EngineError::config("source", "a frame source is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| EngineError::surface("no output surface adapter supplied"))?;
        let clock = self
            .clock
            .ok_or_else(|| EngineError::config("clock", "a frame clock is required"))?;

        Ok(UpscalingEngine {
            config: self.config,
            display,
            state: EngineState::Idle,
            destroyed: false,
            source,
            sink,
            clock,
            bitrate_sink: self.bitrate_sink,
            model: None,
            chain: None,
            plan: None,
            stats: Arc::new(StatsCell::new()),
            accountant: None,
            last_tick: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
