//! # Smallpixel Upscaling Engine
//!
//! A client-side adaptive upscaling engine: video is delivered at a lower
//! resolution tier and upscaled to the display's native tier on the viewer's
//! own hardware, trading cheap local compute for expensive bandwidth.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `engine`: High-level facade, lifecycle state machine and frame loop
//! - `render`: The AI / GPU-shader / CPU render strategies and the
//!   permanent-downgrade chain that orders them
//! - `model`: One-shot asynchronous super-resolution model loader
//! - `host`: The adapter traits a concrete runtime implements (frame
//!   source, output surface, display clock, ABR signal)
//! - `config`: Configuration types and validation
//! - `stats`: Session statistics and bandwidth savings accounting
//!
//! Resolution planning and the CPU resize kernel live in the `sp_scale`
//! sub-crate so they can be reused without pulling in the engine.
//!
//! ## Features
//!
//! - **Graceful degradation**: AI → GPU shader → CPU, downgrading
//!   permanently within a session when a strategy fails
//! - **Bandwidth accounting**: per-session savings percentage and
//!   accumulated megabytes, monotonically non-decreasing
//! - **Host agnostic**: all runtime integration behind four small traits
//! - **Async/await**: built on Tokio, no threads of its own
//!
//! ## Example
//!
//! ```rust,no_run
//! use smallpixel::config::{DisplayGeometry, EngineConfig};
//! use smallpixel::engine::UpscalingEngine;
//! # use smallpixel::host::{FrameClock, FrameSink, FrameSource};
//!
//! # async fn example(
//! #     source: impl FrameSource + 'static,
//! #     sink: impl FrameSink + 'static,
//! #     clock: impl FrameClock + 'static,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = UpscalingEngine::builder()
//!     .config(EngineConfig::default())
//!     .display(DisplayGeometry::new(1920, 1080))
//!     .source(source)
//!     .sink(sink)
//!     .clock(clock)
//!     .build()?;
//!
//! engine.initialize().await?;
//! engine.start().await?;
//! engine.run().await?;
//! println!("saved {:.1} MB", engine.stats().bandwidth_saved_mb);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod model;
pub mod render;
pub mod stats;

/// Re-export error types for convenience
pub use error::{EngineError, EngineResult};

/// Re-export the facade and its lifecycle types
pub use engine::{EngineBuilder, EngineState, StopHandle, UpscalingEngine};

/// Re-export commonly used types from the planning sub-crate
pub use sp_scale::savings::{compute_savings, Savings};
pub use sp_scale::tiers::{Size, Tier};
