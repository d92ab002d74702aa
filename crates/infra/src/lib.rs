//! # Rebound Infrastructure
//!
//! Infrastructure implementations of the retry engine's ports.
//!
//! This crate contains:
//! - The `reqwest` HTTP transport
//! - The tokio task/timer scheduler
//! - Configuration loading (files + environment)
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `rebound-core`
//! - Contains all "impure" code (sockets, runtime handles, filesystem)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod scheduling;

use std::sync::Arc;

use rebound_core::{RetryingClient, RetryingClientBuilder};
use rebound_domain::{ClientConfig, Result};

pub use errors::InfraError;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use observability::{init_tracing, LogFormat};
pub use scheduling::{SchedulerError, TokioScheduler};

/// Client builder wired with the `reqwest` transport and `scheduler`,
/// ready for extra observers
///
/// # Errors
/// Returns `ReboundError::Config` if the retry or transport settings are
/// invalid.
pub fn client_builder_on(
    config: &ClientConfig,
    scheduler: TokioScheduler,
) -> Result<RetryingClientBuilder> {
    let policy = config.retry.to_policy()?;
    let transport = ReqwestTransport::from_settings(&config.transport)?;

    tracing::debug!(
        max_attempts = policy.max_attempts(),
        base_delay_ms = policy.base_delay().as_millis() as u64,
        max_delay_ms = policy.max_delay().as_millis() as u64,
        "building retrying client"
    );

    Ok(RetryingClient::builder(Arc::new(transport), Arc::new(scheduler)).policy(policy))
}

/// Build a client from `config` on the current tokio runtime
///
/// # Errors
/// Returns `ReboundError::Internal` outside a tokio runtime and
/// `ReboundError::Config` for invalid settings.
pub fn build_client(config: &ClientConfig) -> Result<RetryingClient> {
    let scheduler = TokioScheduler::current()?;
    Ok(client_builder_on(config, scheduler)?.build())
}
