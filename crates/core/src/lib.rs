//! # Rebound Core
//!
//! Retry engine - no infrastructure dependencies.
//!
//! This crate contains:
//! - The `Transport` and `Scheduler` ports
//! - The per-call retry state machine and its completion handle
//! - Retry observers (`tracing` logging, aggregate counters)
//!
//! ## Architecture Principles
//! - Only depends on `rebound-common` and `rebound-domain`
//! - No sockets, sleeps or runtime handles of its own
//! - All I/O and timing via traits

pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use retry::{
    CallError, CallResult, CancellationToken, CompletionHandle, Resolution, RetryEvent,
    RetryObserver, RetryStats, RetryStatsSnapshot, RetryTrigger, RetryingClient,
    RetryingClientBuilder, Scheduler, TracingObserver, Transport,
};
