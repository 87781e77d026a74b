//! # Tiered Render Backends
//!
//! Three strategies implement one operation — consume an input frame,
//! produce an output frame at exactly the target resolution:
//!
//! - [`ai`]: one forward pass through a loaded super-resolution model
//! - [`gpu`]: a WGSL compute pipeline running a Lanczos-3 resampling kernel
//! - [`cpu`]: SIMD resize via `sp_scale` — always available, the ultimate
//!   fallback
//!
//! [`RendererChain`] owns the session's strategies in preference order and
//! enforces the downgrade rule: failures demote permanently (AI→GPU→CPU)
//! for the remainder of the session, so a broken model or lost GPU context
//! costs one frame, not one failure per frame. A fresh `start()` is the
//! only way back up.

pub mod ai;
pub mod cpu;
pub mod gpu;

use sp_scale::tiers::Size;
use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::host::VideoFrame;

/// Which rendering strategy is active. Ordered by preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Super-resolution model inference
    Ai,
    /// GPU compute-shader resampling
    Gpu,
    /// SIMD CPU resize
    Cpu,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Ai => "ai",
            Strategy::Gpu => "gpu",
            Strategy::Cpu => "cpu",
        }
    }
}

/// Decide the session's strategy order from what is actually available.
///
/// AI is eligible only with a loaded model and a usable GPU; the GPU
/// shader needs an adapter; CPU is always present and always last. The
/// result is never empty.
pub fn select_strategies(
    prefer_ai: bool,
    model_available: bool,
    gpu_available: bool,
) -> Vec<Strategy> {
    let mut order = Vec::with_capacity(3);
    if prefer_ai && model_available && gpu_available {
        order.push(Strategy::Ai);
    }
    if gpu_available {
        order.push(Strategy::Gpu);
    }
    order.push(Strategy::Cpu);
    order
}

/// One render strategy. Implementations must produce output at exactly the
/// requested target size or fail; callers never see partial frames.
pub trait FrameRenderer: Send {
    fn strategy(&self) -> Strategy;

    fn render(&mut self, frame: &VideoFrame, target: Size) -> EngineResult<VideoFrame>;
}

/// Session-scoped chain of strategies in preference order.
///
/// Downgrades are one-directional and permanent within a session; a failed
/// strategy is never re-attempted until a new chain is built at the next
/// `start()`.
pub struct RendererChain {
    renderers: Vec<Box<dyn FrameRenderer>>,
    active: usize,
    downgrades: u32,
}

impl RendererChain {
    /// Build a chain from strategies in preference order. The last entry is
    /// expected to be the CPU renderer, which never fails functionally.
    pub fn new(renderers: Vec<Box<dyn FrameRenderer>>) -> EngineResult<Self> {
        if renderers.is_empty() {
            return Err(EngineError::render("chain", "no strategies available"));
        }
        Ok(Self {
            renderers,
            active: 0,
            downgrades: 0,
        })
    }

    pub fn active_strategy(&self) -> Strategy {
        self.renderers[self.active].strategy()
    }

    pub fn downgrades(&self) -> u32 {
        self.downgrades
    }

    /// Render one frame with the active strategy, demoting permanently on
    /// failure. Returns an error only when the final strategy also fails —
    /// the caller treats that as a skipped frame, never a crash.
    pub fn render(&mut self, frame: &VideoFrame, target: Size) -> EngineResult<VideoFrame> {
        loop {
            let renderer = &mut self.renderers[self.active];
            let strategy = renderer.strategy();
            match renderer.render(frame, target) {
                Ok(out) if out.width == target.w && out.height == target.h => return Ok(out),
                Ok(out) => {
                    // Wrong-sized output breaks the exact-size contract;
                    // treated the same as a render failure.
                    let err = EngineError::render(
                        strategy.name(),
                        format!(
                            "produced {}x{}, expected {}x{}",
                            out.width, out.height, target.w, target.h
                        ),
                    );
                    if !self.demote(&err) {
                        return Err(err);
                    }
                }
                Err(err) => {
                    if !self.demote(&err) {
                        return Err(err);
                    }
                }
            }
        }
    }

    fn demote(&mut self, err: &EngineError) -> bool {
        if self.active + 1 >= self.renderers.len() {
            return false;
        }
        let from = self.renderers[self.active].strategy();
        self.active += 1;
        self.downgrades += 1;
        let to = self.renderers[self.active].strategy();
        warn!(
            from = from.name(),
            to = to.name(),
            error = %err,
            "render strategy downgraded for the rest of the session"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FailingRenderer {
        strategy: Strategy,
        calls: Arc<AtomicU32>,
    }

    impl FrameRenderer for FailingRenderer {
        fn strategy(&self) -> Strategy {
            self.strategy
        }
        fn render(&mut self, _frame: &VideoFrame, _target: Size) -> EngineResult<VideoFrame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::render(self.strategy.name(), "injected failure"))
        }
    }

    struct SolidRenderer {
        calls: Arc<AtomicU32>,
    }

    impl FrameRenderer for SolidRenderer {
        fn strategy(&self) -> Strategy {
            Strategy::Cpu
        }
        fn render(&mut self, _frame: &VideoFrame, target: Size) -> EngineResult<VideoFrame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(VideoFrame::tightly_packed(
                vec![0u8; (target.w * target.h * 4) as usize],
                target.w,
                target.h,
            ))
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame::tightly_packed(vec![0u8; 4 * 4 * 4], 4, 4)
    }

    #[test]
    fn failed_strategy_is_never_reattempted() {
        let ai_calls = Arc::new(AtomicU32::new(0));
        let cpu_calls = Arc::new(AtomicU32::new(0));
        let mut chain = RendererChain::new(vec![
            Box::new(FailingRenderer {
                strategy: Strategy::Ai,
                calls: ai_calls.clone(),
            }),
            Box::new(SolidRenderer {
                calls: cpu_calls.clone(),
            }),
        ])
        .unwrap();

        let target = Size { w: 8, h: 8 };
        for _ in 0..5 {
            chain.render(&frame(), target).unwrap();
        }

        assert_eq!(ai_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cpu_calls.load(Ordering::SeqCst), 5);
        assert_eq!(chain.active_strategy(), Strategy::Cpu);
        assert_eq!(chain.downgrades(), 1);
    }

    #[test]
    fn downgrade_walks_the_full_chain_in_one_call() {
        let ai_calls = Arc::new(AtomicU32::new(0));
        let gpu_calls = Arc::new(AtomicU32::new(0));
        let cpu_calls = Arc::new(AtomicU32::new(0));
        let mut chain = RendererChain::new(vec![
            Box::new(FailingRenderer {
                strategy: Strategy::Ai,
                calls: ai_calls.clone(),
            }),
            Box::new(FailingRenderer {
                strategy: Strategy::Gpu,
                calls: gpu_calls.clone(),
            }),
            Box::new(SolidRenderer {
                calls: cpu_calls.clone(),
            }),
        ])
        .unwrap();

        chain.render(&frame(), Size { w: 8, h: 8 }).unwrap();
        assert_eq!(chain.downgrades(), 2);
        assert_eq!(chain.active_strategy(), Strategy::Cpu);
    }

    #[test]
    fn exhausted_chain_reports_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut chain = RendererChain::new(vec![Box::new(FailingRenderer {
            strategy: Strategy::Cpu,
            calls,
        })])
        .unwrap();

        let err = chain.render(&frame(), Size { w: 8, h: 8 }).unwrap_err();
        assert_eq!(err.category(), "render");
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(RendererChain::new(Vec::new()).is_err());
    }

    #[test]
    fn ai_needs_both_a_model_and_a_gpu() {
        assert_eq!(
            select_strategies(true, true, true),
            vec![Strategy::Ai, Strategy::Gpu, Strategy::Cpu]
        );
        // AI preference without a GPU cannot select AI either.
        assert_eq!(select_strategies(true, true, false), vec![Strategy::Cpu]);
    }

    #[test]
    fn rejected_model_leads_with_the_gpu_shader() {
        assert_eq!(
            select_strategies(true, false, true),
            vec![Strategy::Gpu, Strategy::Cpu]
        );
    }

    #[test]
    fn low_quality_skips_ai_even_with_a_model() {
        assert_eq!(
            select_strategies(false, true, true),
            vec![Strategy::Gpu, Strategy::Cpu]
        );
    }

    #[test]
    fn cpu_is_always_the_last_resort() {
        for prefer_ai in [false, true] {
            for model in [false, true] {
                for gpu in [false, true] {
                    let order = select_strategies(prefer_ai, model, gpu);
                    assert_eq!(order.last(), Some(&Strategy::Cpu));
                    assert!(!order.is_empty());
                }
            }
        }
        assert_eq!(select_strategies(false, false, false), vec![Strategy::Cpu]);
    }
}
