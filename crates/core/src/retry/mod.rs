//! Retrying HTTP execution
//!
//! A [`RetryingClient`] turns each submitted [`RequestDescriptor`] into an
//! independent call with its own attempt counter and state machine. Calls
//! share nothing mutable except the client's observers.
//!
//! [`RequestDescriptor`]: rebound_domain::RequestDescriptor

mod call;
pub mod client;
pub mod events;
pub mod handle;
pub mod ports;

pub use client::{RetryingClient, RetryingClientBuilder};
pub use events::{
    Resolution, RetryEvent, RetryObserver, RetryStats, RetryStatsSnapshot, RetryTrigger,
    TracingObserver,
};
pub use handle::{CallError, CallResult, CompletionHandle};
pub use ports::{CancellationToken, Scheduler, Transport};
