//! # Engine Configuration
//!
//! Immutable configuration supplied at construction. Changing any field
//! requires building a new engine instance; nothing here is mutated after
//! `UpscalingEngine::builder().build()` succeeds.
//!
//! ## Quality Presets
//!
//! `quality` selects which super-resolution model asset the loader fetches
//! and whether the AI strategy is eligible at all:
//! - `low`: fsrcnn-x2 (fast, modest quality)
//! - `medium`: esrgan-x2 (balanced)
//! - `high`: realesrgan-x2 (high quality) — AI-eligible
//! - `ultra`: realesrgan-x4 (best quality, 4x factor) — AI-eligible

use sp_scale::tiers::Tier;

use crate::error::{EngineError, EngineResult};

/// Upscaling quality preset. Selects the preferred model/strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Fast, lower quality
    Low,
    /// Balanced
    Medium,
    /// High quality
    High,
    /// AI-powered, 4x factor
    Ultra,
}

impl Quality {
    /// Only the top two presets are allowed to select the AI strategy.
    pub fn prefers_ai(self) -> bool {
        matches!(self, Quality::High | Quality::Ultra)
    }
}

/// Target output resolution: a fixed ladder tier, or derived from the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetResolution {
    /// Pick the smallest tier covering the display's physical pixels.
    Auto,
    /// Use this tier verbatim regardless of display geometry.
    Fixed(Tier),
}

impl TargetResolution {
    pub fn as_explicit(self) -> Option<Tier> {
        match self {
            TargetResolution::Auto => None,
            TargetResolution::Fixed(tier) => Some(tier),
        }
    }
}

/// Immutable engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Output resolution policy.
    pub target_resolution: TargetResolution,
    /// Model/strategy preference.
    pub quality: Quality,
    /// Master switch. When false the engine never enters the frame loop
    /// and the host keeps playing the unmodified video.
    pub enable_upscaling: bool,
    /// Allow the GPU shader strategy (and, transitively, the AI strategy).
    pub gpu_acceleration: bool,
    /// Signal the desired delivery tier to the external ABR player and
    /// account the nominal savings. When false the engine upscales for
    /// display quality only and reports zero savings.
    pub bandwidth_savings: bool,
    /// Opaque key forwarded on model-fetch requests only.
    pub api_key: String,
    /// URL or directory prefix the model assets live under. `None` disables
    /// the AI tier without touching the network.
    pub model_base: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_resolution: TargetResolution::Auto,
            quality: Quality::High,
            enable_upscaling: true,
            gpu_acceleration: true,
            bandwidth_savings: true,
            api_key: String::new(),
            model_base: None,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration. This is the single synchronous error
    /// surface the host must handle at construction time.
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(base) = &self.model_base {
            if base.trim().is_empty() {
                return Err(EngineError::config(
                    "model_base",
                    "must be a non-empty URL or path when set",
                ));
            }
        }
        if self.quality.prefers_ai() && self.model_base.is_some() && self.api_key.is_empty() {
            tracing::debug!("model_base set without api_key; fetch will be unauthenticated");
        }
        Ok(())
    }
}

/// Display geometry reported by the host, used for auto tier detection.
#[derive(Clone, Copy, Debug)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f64,
}

impl DisplayGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }
}
