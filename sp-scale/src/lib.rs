// SPDX-License-Identifier: MIT
//! # sp-scale: Resolution Planning and CPU Resampling for Client-Side Upscaling
//!
//! This crate holds the pure, runtime-agnostic half of the Smallpixel upscaling
//! engine: the fixed resolution/bitrate ladder, the planning functions that map
//! a display to a target tier and a target tier to its delivery tier, the
//! bandwidth-savings arithmetic derived from the ladder, and the SIMD CPU
//! resampler that serves as the engine's ultimate render fallback.
//!
//! ## Design
//!
//! Everything here is total and deterministic:
//! 1. **No I/O, no async**: planning is a pure function of its arguments
//! 2. **One ladder**: pixel dimensions and bitrates come from a single table,
//!    so planning and savings accounting can never disagree
//! 3. **Fixed source mapping**: each tier delivers from the tier one step
//!    down the ladder, giving a bounded, predictable savings ratio instead of
//!    an adaptive one
//!
//! ## Key Components
//!
//! - [`tiers`]: the `Tier` ladder, target detection and source planning
//! - [`savings`]: savings percentage / MB-per-minute math over the ladder
//! - [`cpu`]: SIMD-accelerated BGRA upscaling into an exact target size
//!
//! ## Usage Example
//!
//! ```rust
//! use sp_scale::tiers::{detect_target, optimal_source, Tier};
//! use sp_scale::savings::compute_savings;
//!
//! // A 4K panel with no explicit override lands on the 4K tier.
//! let target = detect_target(None, 3840, 2160, 1.0);
//! assert_eq!(target, Tier::Uhd4K);
//!
//! // 4K is delivered as 1080p and upscaled on the client.
//! let source = optimal_source(target);
//! assert_eq!(source, Tier::P1080);
//!
//! let s = compute_savings(source, target);
//! assert!((s.percentage - 68.75).abs() < 1e-9);
//! ```

pub mod cpu;
pub mod savings;
pub mod tiers;
