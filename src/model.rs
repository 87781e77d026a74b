//! # Super-Resolution Model Loader
//!
//! One-shot, asynchronous loader for the optional AI model. Quality maps to
//! one of four precomputed ONNX assets; the asset is fetched over HTTP or
//! read from a local path, then committed to an ONNX Runtime session.
//!
//! Failure is non-fatal by design: any fetch, parse or runtime error logs a
//! warning and resolves to `None`, which the strategy selection treats as
//! "AI unavailable". Loading happens at most once per engine instance,
//! before the frame loop starts, and is never retried mid-session.

use std::sync::{Arc, Mutex};

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, Quality};
use crate::error::{EngineError, EngineResult};

/// A loaded super-resolution model. The session is shared between the
/// engine (which owns the model across sessions) and the AI renderer built
/// for each `start()`.
pub struct SrModel {
    pub(crate) session: Mutex<Session>,
    pub(crate) input_name: String,
    pub(crate) output_name: String,
    /// Asset file name, for diagnostics.
    pub asset: &'static str,
}

/// Quality preset → (asset name, fixed scale factor).
pub fn asset_for(quality: Quality) -> (&'static str, u32) {
    match quality {
        Quality::Low => ("fsrcnn-x2.onnx", 2),
        Quality::Medium => ("esrgan-x2.onnx", 2),
        Quality::High => ("realesrgan-x2.onnx", 2),
        Quality::Ultra => ("realesrgan-x4.onnx", 4),
    }
}

/// Load the model selected by the configuration's quality preset.
///
/// Resolves to `None` on any failure; the caller proceeds without the AI
/// tier. Never called more than once per engine instance.
pub async fn load(config: &EngineConfig) -> Option<Arc<SrModel>> {
    let Some(base) = config.model_base.as_deref() else {
        debug!("no model_base configured; AI tier disabled");
        return None;
    };
    let (asset, scale) = asset_for(config.quality);

    let bytes = match fetch(base, asset, &config.api_key).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(asset, error = %err, "model fetch failed; proceeding without AI tier");
            return None;
        }
    };

    match build_model(&bytes, asset) {
        Ok(model) => {
            info!(asset, scale, "super-resolution model loaded");
            Some(Arc::new(model))
        }
        Err(err) => {
            warn!(asset, error = %err, "model rejected by runtime; proceeding without AI tier");
            None
        }
    }
}

async fn fetch(base: &str, asset: &str, api_key: &str) -> EngineResult<Vec<u8>> {
    let location = format!("{}/{}", base.trim_end_matches('/'), asset);
    if location.starts_with("http://") || location.starts_with("https://") {
        let client = reqwest::Client::new();
        let mut request = client.get(&location);
        if !api_key.is_empty() {
            request = request.header("x-api-key", api_key);
        }
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| EngineError::io("model fetch", e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::io("model fetch", e))?;
        Ok(bytes.to_vec())
    } else {
        tokio::fs::read(&location)
            .await
            .map_err(|e| EngineError::io("model read", e))
    }
}

fn build_model(bytes: &[u8], asset: &'static str) -> EngineResult<SrModel> {
    let session = Session::builder()
        .and_then(|b| Ok(b.with_optimization_level(GraphOptimizationLevel::Level3)?))
        .and_then(|b| Ok(b.with_intra_threads(4)?))
        .and_then(|mut b| Ok(b.commit_from_memory(bytes)?))
        .map_err(|e| EngineError::model_load(asset, e.to_string()))?;

    let input_name = session
        .inputs()
        .first()
        .map(|i| i.name().to_string())
        .ok_or_else(|| EngineError::model_load(asset, "model has no inputs"))?;
    let output_name = session
        .outputs()
        .first()
        .map(|o| o.name().to_string())
        .ok_or_else(|| EngineError::model_load(asset, "model has no outputs"))?;

    Ok(SrModel {
        session: Mutex::new(session),
        input_name,
        output_name,
        asset,
    })
}
