//! End-to-end lifecycle tests for the upscaling engine facade.
//!
//! All scenarios run with GPU acceleration disabled so the render chain
//! resolves to the CPU strategy deterministically, independent of the
//! machine the tests run on. The GPU and AI strategies have their own
//! chain-level coverage with injected renderers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smallpixel::config::{DisplayGeometry, EngineConfig, Quality, TargetResolution};
use smallpixel::host::{BitrateSink, FrameClock, FrameSink, FrameSource, VideoFrame};
use smallpixel::render::Strategy;
use smallpixel::{EngineError, EngineResult, EngineState, Size, Tier, UpscalingEngine};

/// Source producing solid-color frames at a fixed size, or nothing at all.
struct SolidSource {
    size: Size,
    starved: bool,
}

impl SolidSource {
    fn new(size: Size) -> Self {
        Self {
            size,
            starved: false,
        }
    }

    fn starved(size: Size) -> Self {
        Self {
            starved: true,
            ..Self::new(size)
        }
    }
}

#[async_trait]
impl FrameSource for SolidSource {
    async fn sample_frame(&mut self) -> Option<VideoFrame> {
        if self.starved {
            return None;
        }
        let len = (self.size.w * self.size.h * 4) as usize;
        Some(VideoFrame::tightly_packed(vec![128u8; len], self.size.w, self.size.h))
    }

    fn input_size(&self) -> Option<Size> {
        Some(self.size)
    }
}

#[derive(Default)]
struct SinkLog {
    acquired: Option<Size>,
    presented: Vec<Size>,
    released: u32,
}

/// Sink recording every interaction for later assertions.
struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    fail_acquire: bool,
}

impl RecordingSink {
    fn new() -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        (
            Self {
                log: Arc::clone(&log),
                fail_acquire: false,
            },
            log,
        )
    }

    fn failing() -> Self {
        Self {
            log: Arc::new(Mutex::new(SinkLog::default())),
            fail_acquire: true,
        }
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn acquire(&mut self, target: Size) -> EngineResult<()> {
        if self.fail_acquire {
            return Err(EngineError::surface("canvas context unavailable"));
        }
        self.log.lock().unwrap().acquired = Some(target);
        Ok(())
    }

    async fn present_frame(&mut self, frame: &VideoFrame) -> EngineResult<()> {
        self.log.lock().unwrap().presented.push(frame.size());
        Ok(())
    }

    async fn release(&mut self) {
        self.log.lock().unwrap().released += 1;
    }
}

/// Clock that resolves immediately; `run()` tests bound it with a stop tap.
struct InstantClock {
    ticks: Arc<AtomicU32>,
    stop_after: Option<(u32, Arc<Mutex<Option<smallpixel::StopHandle>>>)>,
}

impl InstantClock {
    fn new() -> Self {
        Self {
            ticks: Arc::new(AtomicU32::new(0)),
            stop_after: None,
        }
    }

    fn stopping_after(limit: u32, handle: Arc<Mutex<Option<smallpixel::StopHandle>>>) -> Self {
        Self {
            ticks: Arc::new(AtomicU32::new(0)),
            stop_after: Some((limit, handle)),
        }
    }
}

#[async_trait]
impl FrameClock for InstantClock {
    async fn next_frame(&mut self) {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some((limit, handle)) = &self.stop_after {
            if tick >= *limit {
                if let Some(h) = handle.lock().unwrap().as_ref() {
                    h.stop();
                }
            }
        }
        tokio::task::yield_now().await;
    }

    fn refresh_rate(&self) -> f64 {
        60.0
    }
}

struct RecordingBitrateSink {
    requests: Arc<Mutex<Vec<Tier>>>,
}

impl RecordingBitrateSink {
    fn new() -> (Self, Arc<Mutex<Vec<Tier>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                requests: Arc::clone(&requests),
            },
            requests,
        )
    }
}

impl BitrateSink for RecordingBitrateSink {
    fn request_tier(&self, tier: Tier) {
        self.requests.lock().unwrap().push(tier);
    }
}

fn cpu_only_config() -> EngineConfig {
    EngineConfig {
        gpu_acceleration: false,
        quality: Quality::Medium,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn full_lifecycle_on_a_1080p_display() {
    let (sink, log) = RecordingSink::new();
    let (bitrate, requests) = RecordingBitrateSink::new();

    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .bitrate_sink(bitrate)
        .build()
        .unwrap();

    assert_eq!(engine.state(), EngineState::Idle);
    engine.initialize().await.unwrap();
    assert_eq!(engine.state(), EngineState::Ready);

    engine.start().await.unwrap();
    assert_eq!(engine.state(), EngineState::Upscaling);
    assert_eq!(engine.tier_plan(), Some((Tier::P720, Tier::P1080)));
    assert_eq!(engine.active_strategy(), Some(Strategy::Cpu));
    assert_eq!(requests.lock().unwrap().as_slice(), &[Tier::P720]);
    assert_eq!(
        log.lock().unwrap().acquired,
        Some(Size { w: 1920, h: 1080 })
    );

    for _ in 0..5 {
        assert!(engine.on_frame().await);
    }

    let stats = engine.stats();
    assert_eq!(stats.frames_rendered, 5);
    assert_eq!(stats.frames_skipped, 0);
    assert_eq!(stats.original_resolution, "720p");
    assert_eq!(stats.target_resolution, "1080p");
    assert_eq!(stats.active_strategy, Some(Strategy::Cpu));
    assert!(stats.bandwidth_saved_mb >= 0.0);
    assert!(stats.savings_percentage > 0.0);

    // Every presented frame is exactly the target size.
    let presented = log.lock().unwrap().presented.clone();
    assert_eq!(presented.len(), 5);
    assert!(presented.iter().all(|s| *s == Size { w: 1920, h: 1080 }));

    engine.stop();
    assert_eq!(engine.state(), EngineState::Stopped);
    // Stats stay readable after stop.
    assert_eq!(engine.stats().frames_rendered, 5);

    engine.destroy().await;
    assert_eq!(log.lock().unwrap().released, 1);
}

#[tokio::test]
async fn four_k_display_reports_the_ladder_savings() {
    let (sink, _log) = RecordingSink::new();
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(3840, 2160))
        .source(SolidSource::new(Tier::P1080.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();

    assert_eq!(engine.tier_plan(), Some((Tier::P1080, Tier::Uhd4K)));
    // (16000 - 5000) / 16000 of delivery bitrate saved.
    assert!((engine.stats().savings_percentage - 68.75).abs() < 1e-9);
}

#[tokio::test]
async fn device_pixel_ratio_raises_the_auto_target() {
    let (sink, _log) = RecordingSink::new();
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080).with_pixel_ratio(2.0))
        .source(SolidSource::new(Tier::P1080.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();

    // 1920x1080 CSS at 2.0 DPR is physically 4K.
    assert_eq!(engine.tier_plan(), Some((Tier::P1080, Tier::Uhd4K)));
}

#[tokio::test]
async fn start_before_initialize_is_rejected() {
    let (sink, _log) = RecordingSink::new();
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    let err = engine.start().await.unwrap_err();
    assert_eq!(err.category(), "state");
    assert_eq!(engine.state(), EngineState::Idle);
}

#[tokio::test]
async fn initialize_is_one_shot() {
    let (sink, _log) = RecordingSink::new();
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    let err = engine.initialize().await.unwrap_err();
    assert_eq!(err.category(), "state");
    assert_eq!(engine.state(), EngineState::Ready);
}

#[tokio::test]
async fn stop_and_destroy_are_idempotent() {
    let (sink, log) = RecordingSink::new();
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();
    engine.on_frame().await;

    engine.stop();
    engine.stop();
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(engine.stats().frames_rendered, 1);

    engine.destroy().await;
    engine.destroy().await;
    assert_eq!(log.lock().unwrap().released, 1);
}

#[tokio::test]
async fn restart_resets_stats_and_replans() {
    let (sink, _log) = RecordingSink::new();
    let (bitrate, requests) = RecordingBitrateSink::new();
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .bitrate_sink(bitrate)
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();
    for _ in 0..3 {
        engine.on_frame().await;
    }
    engine.stop();
    assert_eq!(engine.stats().frames_rendered, 3);

    engine.start().await.unwrap();
    assert_eq!(engine.state(), EngineState::Upscaling);
    assert_eq!(engine.stats().frames_rendered, 0);
    assert_eq!(engine.stats().bandwidth_saved_mb, 0.0);
    // The delivery tier is requested again for the new session.
    assert_eq!(requests.lock().unwrap().len(), 2);

    engine.on_frame().await;
    assert_eq!(engine.stats().frames_rendered, 1);
}

#[tokio::test]
async fn disabled_upscaling_refuses_to_start() {
    let (sink, _log) = RecordingSink::new();
    let config = EngineConfig {
        enable_upscaling: false,
        ..cpu_only_config()
    };
    let mut engine = UpscalingEngine::builder()
        .config(config)
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    let err = engine.start().await.unwrap_err();
    assert_eq!(err.category(), "config");
    assert_eq!(engine.state(), EngineState::Ready);
}

#[tokio::test]
async fn surface_acquire_failure_is_terminal() {
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(RecordingSink::failing())
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    let err = engine.start().await.unwrap_err();
    assert_eq!(err.category(), "surface");
    assert_eq!(engine.state(), EngineState::Failed);

    // Failed is terminal: no restart is possible.
    let err = engine.start().await.unwrap_err();
    assert_eq!(err.category(), "state");
    assert_eq!(engine.state(), EngineState::Failed);
}

#[tokio::test]
async fn starved_source_skips_without_leaving_the_loop() {
    let (sink, log) = RecordingSink::new();
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::starved(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();

    for _ in 0..4 {
        assert!(!engine.on_frame().await);
    }

    let stats = engine.stats();
    assert_eq!(stats.frames_rendered, 0);
    assert_eq!(stats.frames_skipped, 4);
    assert_eq!(engine.state(), EngineState::Upscaling);
    assert!(log.lock().unwrap().presented.is_empty());
}

#[tokio::test]
async fn destroyed_engine_cannot_restart() {
    let (sink, log) = RecordingSink::new();
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();
    engine.on_frame().await;
    engine.destroy().await;
    assert_eq!(log.lock().unwrap().released, 1);

    // The sink is released and the source detached; a restart would run a
    // session against resources that no longer exist.
    let err = engine.start().await.unwrap_err();
    assert_eq!(err.category(), "state");
    let err = engine.initialize().await.unwrap_err();
    assert_eq!(err.category(), "state");

    // No session was re-acquired, so there is nothing new to release.
    engine.destroy().await;
    assert_eq!(log.lock().unwrap().released, 1);
    assert!(log.lock().unwrap().acquired.is_some());
    assert_eq!(engine.stats().frames_rendered, 1);
}

#[tokio::test]
async fn disabled_savings_delivers_at_the_target_tier() {
    let (sink, _log) = RecordingSink::new();
    let (bitrate, requests) = RecordingBitrateSink::new();
    let config = EngineConfig {
        bandwidth_savings: false,
        ..cpu_only_config()
    };
    let mut engine = UpscalingEngine::builder()
        .config(config)
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P1080.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .bitrate_sink(bitrate)
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();
    engine.on_frame().await;

    assert_eq!(engine.tier_plan(), Some((Tier::P1080, Tier::P1080)));
    assert!(requests.lock().unwrap().is_empty());
    let stats = engine.stats();
    assert_eq!(stats.savings_percentage, 0.0);
    assert_eq!(stats.bandwidth_saved_mb, 0.0);
}

#[tokio::test]
async fn fixed_target_overrides_display_detection() {
    let (sink, log) = RecordingSink::new();
    let config = EngineConfig {
        target_resolution: TargetResolution::Fixed(Tier::Uhd4K),
        ..cpu_only_config()
    };
    let mut engine = UpscalingEngine::builder()
        .config(config)
        .display(DisplayGeometry::new(1280, 720))
        .source(SolidSource::new(Tier::P1080.size()))
        .sink(sink)
        .clock(InstantClock::new())
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();

    assert_eq!(engine.tier_plan(), Some((Tier::P1080, Tier::Uhd4K)));
    assert_eq!(
        log.lock().unwrap().acquired,
        Some(Size { w: 3840, h: 2160 })
    );
}

#[tokio::test]
async fn run_loop_honors_the_stop_handle() {
    let (sink, _log) = RecordingSink::new();
    let handle_cell: Arc<Mutex<Option<smallpixel::StopHandle>>> = Arc::new(Mutex::new(None));
    let mut engine = UpscalingEngine::builder()
        .config(cpu_only_config())
        .display(DisplayGeometry::new(1920, 1080))
        .source(SolidSource::new(Tier::P720.size()))
        .sink(sink)
        .clock(InstantClock::stopping_after(4, Arc::clone(&handle_cell)))
        .build()
        .unwrap();

    engine.initialize().await.unwrap();
    engine.start().await.unwrap();
    *handle_cell.lock().unwrap() = Some(engine.stop_handle());

    engine.run().await.unwrap();

    assert_eq!(engine.state(), EngineState::Stopped);
    // The stop lands during tick 4's clock wait, before that frame renders.
    assert_eq!(engine.stats().frames_rendered, 3);
}
