//! Resilience patterns for transient-failure handling
//!
//! This module provides **generic, reusable** building blocks:
//! - **Backoff**: exponential delay growth with a cap
//! - **Jitter**: randomization that keeps independent callers from retrying
//!   in lockstep
//!
//! The retry orchestration itself lives in `rebound-core`; nothing here knows
//! about HTTP.

pub mod backoff;

pub use backoff::{ExponentialBackoff, Jitter};
