//! CPU render strategy: SIMD resize via `sp_scale`. Always available,
//! functionally infallible for well-formed frames, and therefore the last
//! entry of every renderer chain.

use fast_image_resize::Resizer;
use sp_scale::cpu::{upscale_bgra_cpu, Staging};
use sp_scale::tiers::Size;

use crate::error::EngineResult;
use crate::host::VideoFrame;
use crate::render::{FrameRenderer, Strategy};

pub struct CpuRenderer {
    resizer: Resizer,
    staging: Staging,
}

impl CpuRenderer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
            staging: Staging::with_capacity(0),
        }
    }
}

impl Default for CpuRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer for CpuRenderer {
    fn strategy(&self) -> Strategy {
        Strategy::Cpu
    }

    fn render(&mut self, frame: &VideoFrame, target: Size) -> EngineResult<VideoFrame> {
        let dst_len = (target.w as usize) * (target.h as usize) * 4;
        let mut dst = vec![0u8; dst_len];

        upscale_bgra_cpu(
            &mut self.resizer,
            &frame.data,
            frame.size(),
            Some(frame.stride),
            target,
            &mut dst,
            Some(&mut self.staging),
        )?;

        let mut out = VideoFrame::tightly_packed(dst, target.w, target.h);
        out.pts_ns = frame.pts_ns;
        Ok(out)
    }
}
