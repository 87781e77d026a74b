// SPDX-License-Identifier: MIT
// CPU upscaler built on fast_image_resize (SIMD-accelerated).
// BGRA8 in → BGRA8 out at exactly the requested target size, written
// directly into a caller-provided dst buffer. This is the engine's
// ultimate fallback path and must work on any host.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::tiers::Size;

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall,
    SourceTooSmall,
    StrideMismatchAndNoStaging,
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError {
    fn from(e: fir::ResizeError) -> Self {
        Self::Fir(e)
    }
}
impl From<fir::ImageBufferError> for ScaleError {
    fn from(e: fir::ImageBufferError) -> Self {
        Self::ImageBuf(e)
    }
}

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall => write!(f, "Output buffer too small"),
            ScaleError::SourceTooSmall => write!(f, "Source buffer shorter than stride * height"),
            ScaleError::StrideMismatchAndNoStaging => {
                write!(f, "Stride mismatch but no staging buffer provided")
            }
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Pre-allocated scratch to compact strided input to tightly packed rows (only if needed).
pub struct Staging {
    buf: Vec<u8>,
}

impl Staging {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }
    pub fn ensure_len(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// Main upscaling entry point.
///
/// `src_stride_bytes`: bytes per row of source. If `Some(stride) != width*4`,
/// rows are compacted into `staging` first.
/// `dst` must hold at least `target.w * target.h * 4` bytes (BGRA); the frame
/// is resampled to exactly `target`, upscaling or downscaling as needed.
pub fn upscale_bgra_cpu(
    resizer: &mut Resizer,
    src_bgra: &[u8],
    src: Size,
    src_stride_bytes: Option<usize>,
    target: Size,
    dst: &mut [u8],
    mut staging: Option<&mut Staging>,
) -> Result<(), ScaleError> {
    let dst_len = (target.w as usize) * (target.h as usize) * 4;
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall);
    }

    // Build a tightly packed source view, compacting strided rows if needed.
    let tight_row_bytes = (src.w as usize) * 4;
    let src_view: TypedImageRef<U8x4>;
    match src_stride_bytes {
        Some(pitch) if pitch != tight_row_bytes => {
            if src_bgra.len() < pitch * (src.h as usize) {
                return Err(ScaleError::SourceTooSmall);
            }
            let st = staging
                .as_deref_mut()
                .ok_or(ScaleError::StrideMismatchAndNoStaging)?;
            st.ensure_len(tight_row_bytes * (src.h as usize));
            compact_rows(
                src_bgra,
                pitch,
                st.buf.as_mut_slice(),
                tight_row_bytes,
                src.h as usize,
            );
            src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, st.as_slice())?;
        }
        _ => {
            if src_bgra.len() < tight_row_bytes * (src.h as usize) {
                return Err(ScaleError::SourceTooSmall);
            }
            src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, src_bgra)?;
        }
    }

    let mut dst_image = TypedImage::<U8x4>::from_buffer(target.w, target.h, &mut dst[..dst_len])?;

    // Lanczos3 is fir's default convolution; alpha weighting is unnecessary
    // for opaque video frames and costs a pass.
    let opts = ResizeOptions::new().use_alpha(false);
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;

    Ok(())
}

#[inline]
fn compact_rows(src: &[u8], src_pitch: usize, dst: &mut [u8], row_bytes: usize, rows: usize) {
    for r in 0..rows {
        let s = &src[r * src_pitch..r * src_pitch + row_bytes];
        let d = &mut dst[r * row_bytes..(r + 1) * row_bytes];
        d.copy_from_slice(s);
    }
}
