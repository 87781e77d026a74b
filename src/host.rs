//! # Host Adapter Seam
//!
//! The engine's planning, accounting and state-machine logic is runtime
//! agnostic; everything a concrete runtime must supply is collected here as
//! four small traits. A port to a new host implements frame sampling,
//! presentation and vsync scheduling against its native primitives and
//! reuses the rest of the crate unchanged.
//!
//! The engine only ever *reads* from the source — it never seeks or controls
//! playback — and owns the sink exclusively while upscaling.

use std::sync::Arc;

use async_trait::async_trait;
use sp_scale::tiers::{Size, Tier};

use crate::error::EngineResult;

/// One video frame: raw BGRA pixels behind an atomically refcounted buffer.
///
/// `stride` may exceed `width * 4` when the host hands out padded rows.
#[derive(Clone)]
pub struct VideoFrame {
    /// Raw BGRA pixel data. Length must be at least `stride * height`.
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row
    pub stride: usize,
    /// Optional presentation timestamp in nanoseconds
    pub pts_ns: Option<u64>,
}

impl VideoFrame {
    /// Wrap a tightly packed BGRA buffer.
    pub fn tightly_packed(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data: Arc::new(data),
            width,
            height,
            stride: width as usize * 4,
            pts_ns: None,
        }
    }

    pub fn size(&self) -> Size {
        Size {
            w: self.width,
            h: self.height,
        }
    }

    /// A frame is well-formed when its buffer covers `stride * height` and
    /// the stride covers the pixel row. Malformed frames are skipped, never
    /// rendered partially.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.stride >= self.width as usize * 4
            && self.data.len() >= self.stride * self.height as usize
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("pts_ns", &self.pts_ns)
            .finish()
    }
}

/// Live video frame source the engine samples once per loop iteration.
#[async_trait]
pub trait FrameSource: Send {
    /// Sample the current frame. `None` means no frame is available right
    /// now (decoder starvation, sample race); the engine skips that
    /// iteration and tries again on the next callback.
    async fn sample_frame(&mut self) -> Option<VideoFrame>;

    /// Native resolution of the source, if known in advance.
    fn input_size(&self) -> Option<Size> {
        None
    }

    /// Detach from the underlying video element. Called once on `destroy()`.
    async fn detach(&mut self) {}
}

/// Output surface the engine draws upscaled frames into.
#[async_trait]
pub trait FrameSink: Send {
    /// Take exclusive ownership of the surface for a session, sized to the
    /// target tier. Failure here is the one unrecoverable error: the engine
    /// transitions to `Failed` and the host falls back to raw playback.
    async fn acquire(&mut self, target: Size) -> EngineResult<()>;

    /// Present one finished frame. The frame is always exactly the target
    /// size; the sink never sees partial output.
    async fn present_frame(&mut self, frame: &VideoFrame) -> EngineResult<()>;

    /// Release the surface. Called once on `destroy()`; must be safe to
    /// call after `acquire` failed or never ran.
    async fn release(&mut self) {}
}

/// The host's display refresh mechanism. The loop is tied to real vsync,
/// never a fixed timer, so the engine cannot render faster than the surface
/// can present.
#[async_trait]
pub trait FrameClock: Send {
    /// Resolve on the next display refresh.
    async fn next_frame(&mut self);

    /// Nominal refresh rate in Hz, reported in the stats snapshot.
    fn refresh_rate(&self) -> f64 {
        60.0
    }
}

/// Outbound, fire-and-forget signal to the external ABR player carrying the
/// desired delivery tier. There is no acknowledgment protocol; the player
/// honors it on a best-effort basis.
pub trait BitrateSink: Send {
    fn request_tier(&self, tier: Tier);
}
