//! Tracing subscriber setup
//!
//! The retry engine only emits `tracing` events; binaries decide where they
//! go. Call [`init_tracing`] once at startup.

use rebound_domain::{ReboundError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor an explicit directive is given
pub const DEFAULT_FILTER: &str = "info,rebound_core=debug";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Build the filter: `directives` if given, else `RUST_LOG`, else [`DEFAULT_FILTER`]
pub fn env_filter(directives: Option<&str>) -> Result<EnvFilter> {
    match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| ReboundError::Config(format!("Invalid log filter '{directives}': {e}"))),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns `ReboundError::Config` for an invalid filter and
/// `ReboundError::Internal` if a global subscriber is already set.
pub fn init_tracing(directives: Option<&str>, format: LogFormat) -> Result<()> {
    let filter = env_filter(directives)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_current_span(false)).try_init()
        }
    };

    installed.map_err(|e| {
        ReboundError::Internal(format!("Failed to install tracing subscriber: {e}"))
    })
}
