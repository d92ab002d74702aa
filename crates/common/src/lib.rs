//! Modular common utilities shared across Rebound crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: pure utilities (backoff and jitter calculation)
//! - `runtime`: synchronization primitives (single-assignment cells)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod resilience;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod sync;

// Re-export commonly used types for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use resilience::{ExponentialBackoff, Jitter};
#[cfg(feature = "runtime")]
pub use sync::SettleCell;
