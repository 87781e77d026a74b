//! # Engine Error Taxonomy
//!
//! Errors are grouped by how the engine reacts to them, per the failure
//! policy of the frame loop:
//!
//! - **Config / State**: the only errors surfaced synchronously to the host
//!   (invalid configuration, lifecycle calls in the wrong order)
//! - **Surface**: no rendering surface could be acquired at all; the engine
//!   enters its terminal `Failed` state and the host falls back to the
//!   unmodified video element
//! - **ModelLoad / Render / Frame**: absorbed internally — they drive
//!   strategy downgrades or per-frame skips and never cross the facade
//! - **Io**: transport failures during model fetch, also absorbed

use std::{error::Error as StdError, fmt};

/// Base error type for the upscaling engine.
#[derive(Debug)]
pub enum EngineError {
    /// Configuration validation errors
    Config { field: String, reason: String },
    /// Lifecycle calls made from an invalid state
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
    },
    /// No rendering surface obtainable — unrecoverable
    Surface { reason: String },
    /// Super-resolution model could not be fetched or parsed
    ModelLoad { asset: String, reason: String },
    /// A render strategy failed on a frame
    Render { strategy: String, reason: String },
    /// A sampled frame was unusable (bad dimensions, short buffer)
    Frame { reason: String },
    /// I/O errors during model fetch
    Io {
        operation: String,
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl EngineError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
        }
    }

    pub fn surface(reason: impl Into<String>) -> Self {
        Self::Surface {
            reason: reason.into(),
        }
    }

    pub fn model_load(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            asset: asset.into(),
            reason: reason.into(),
        }
    }

    pub fn render(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Render {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    pub fn frame(reason: impl Into<String>) -> Self {
        Self::Frame {
            reason: reason.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Io {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Get the error category as a string.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::State { .. } => "state",
            Self::Surface { .. } => "surface",
            Self::ModelLoad { .. } => "model_load",
            Self::Render { .. } => "render",
            Self::Frame { .. } => "frame",
            Self::Io { .. } => "io",
        }
    }

}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config { field, reason } => {
                write!(f, "Configuration error in '{}': {}", field, reason)
            }
            EngineError::State {
                current_state,
                attempted_operation,
                reason,
            } => write!(
                f,
                "Invalid operation '{}' in state '{}': {}",
                attempted_operation, current_state, reason
            ),
            EngineError::Surface { reason } => {
                write!(f, "No rendering surface available: {}", reason)
            }
            EngineError::ModelLoad { asset, reason } => {
                write!(f, "Failed to load model '{}': {}", asset, reason)
            }
            EngineError::Render { strategy, reason } => {
                write!(f, "Render strategy '{}' failed: {}", strategy, reason)
            }
            EngineError::Frame { reason } => write!(f, "Unusable frame: {}", reason),
            EngineError::Io { operation, source } => {
                write!(f, "I/O error during {}: {}", operation, source)
            }
        }
    }
}

impl StdError for EngineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using the engine error type.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<sp_scale::cpu::ScaleError> for EngineError {
    fn from(error: sp_scale::cpu::ScaleError) -> Self {
        Self::render("cpu", error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_the_category() {
        let err = EngineError::config("quality", "unknown value");
        assert_eq!(err.category(), "config");

        let err = EngineError::render("ai", "inference failed");
        assert_eq!(err.category(), "render");
    }

    #[test]
    fn display_includes_operation() {
        let err = EngineError::state("Idle", "start", "initialize() has not completed");
        let msg = err.to_string();
        assert!(msg.contains("start"));
        assert!(msg.contains("Idle"));
    }
}
