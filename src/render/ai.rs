//! AI render strategy: one forward pass through the loaded super-resolution
//! model per frame.
//!
//! The frame is converted to a normalized NCHW float tensor, run through the
//! session, and converted back to BGRA pixels. Models carry a fixed scale
//! factor (2x/4x), so the inference output is resampled on the CPU to the
//! exact session target when the factor misses it — callers always get
//! exactly target-sized frames.
//!
//! Any runtime exception here is surfaced as a render error; the chain then
//! demotes permanently so a broken model is paid for once, not every frame.

use std::sync::Arc;

use fast_image_resize::Resizer;
use ndarray::Array4;
use ort::value::Tensor;
use sp_scale::cpu::upscale_bgra_cpu;
use sp_scale::tiers::Size;

use crate::error::{EngineError, EngineResult};
use crate::host::VideoFrame;
use crate::model::SrModel;
use crate::render::{FrameRenderer, Strategy};

pub struct AiRenderer {
    model: Arc<SrModel>,
    // Exact-fit pass for when the model's fixed factor misses the target.
    resizer: Resizer,
}

impl AiRenderer {
    pub fn new(model: Arc<SrModel>) -> Self {
        Self {
            model,
            resizer: Resizer::new(),
        }
    }

    /// BGRA bytes → normalized NCHW RGB tensor in [0, 1].
    fn to_tensor(frame: &VideoFrame) -> Array4<f32> {
        let (w, h) = (frame.width as usize, frame.height as usize);
        let mut arr = Array4::<f32>::zeros((1, 3, h, w));
        for y in 0..h {
            let row = &frame.data[y * frame.stride..y * frame.stride + w * 4];
            for x in 0..w {
                let px = &row[x * 4..x * 4 + 4];
                arr[[0, 0, y, x]] = px[2] as f32 / 255.0;
                arr[[0, 1, y, x]] = px[1] as f32 / 255.0;
                arr[[0, 2, y, x]] = px[0] as f32 / 255.0;
            }
        }
        arr
    }

    /// NCHW RGB floats in [0, 1] → tightly packed BGRA bytes.
    fn to_bgra(view: &ndarray::ArrayView4<f32>, w: usize, h: usize) -> Vec<u8> {
        let mut out = vec![255u8; w * h * 4];
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 4;
                out[i] = (view[[0, 2, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8;
                out[i + 1] = (view[[0, 1, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8;
                out[i + 2] = (view[[0, 0, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
        out
    }
}

impl FrameRenderer for AiRenderer {
    fn strategy(&self) -> Strategy {
        Strategy::Ai
    }

    fn render(&mut self, frame: &VideoFrame, target: Size) -> EngineResult<VideoFrame> {
        if !frame.is_well_formed() {
            return Err(EngineError::frame("short or zero-sized input frame"));
        }

        let input = Tensor::from_array(Self::to_tensor(frame))
            .map_err(|e| EngineError::render("ai", format!("tensor build failed: {e}")))?;

        let (inferred, inferred_size) = {
            let mut session = self
                .model
                .session
                .lock()
                .map_err(|_| EngineError::render("ai", "model session lock poisoned"))?;
            let input_name = self.model.input_name.as_str();
            let outputs = session
                .run(ort::inputs![input_name => &input])
                .map_err(|e| EngineError::render("ai", format!("inference failed: {e}")))?;
            let value = outputs
                .get(self.model.output_name.as_str())
                .ok_or_else(|| {
                    EngineError::render(
                        "ai",
                        format!("output '{}' missing from results", self.model.output_name),
                    )
                })?;
            let view = value
                .try_extract_array::<f32>()
                .map_err(|e| EngineError::render("ai", format!("output extract failed: {e}")))?;
            let dims = view.shape().to_vec();
            if dims.len() != 4 || dims[1] != 3 {
                return Err(EngineError::render(
                    "ai",
                    format!("expected NCHW RGB output, got shape {:?}", dims),
                ));
            }
            let (oh, ow) = (dims[2], dims[3]);
            let view4 = view
                .into_dimensionality::<ndarray::Ix4>()
                .map_err(|e| EngineError::render("ai", format!("output not 4-D: {e}")))?;
            (
                Self::to_bgra(&view4, ow, oh),
                Size {
                    w: ow as u32,
                    h: oh as u32,
                },
            )
        };

        // Fixed-factor models rarely land exactly on the tier dimensions;
        // finish with a CPU resample to the exact target.
        let data = if inferred_size == target {
            inferred
        } else {
            let mut dst = vec![0u8; (target.w * target.h * 4) as usize];
            upscale_bgra_cpu(
                &mut self.resizer,
                &inferred,
                inferred_size,
                None,
                target,
                &mut dst,
                None,
            )?;
            dst
        };

        let mut out = VideoFrame::tightly_packed(data, target.w, target.h);
        out.pts_ns = frame.pts_ns;
        Ok(out)
    }
}
