//! Scheduler error types

use rebound_domain::ReboundError;
use thiserror::Error;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No tokio runtime is active on the calling thread
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        InfraError(ReboundError::Internal(err.to_string()))
    }
}

impl From<SchedulerError> for ReboundError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}
