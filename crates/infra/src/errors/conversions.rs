//! Conversions from external infrastructure errors into domain errors.

use rebound_domain::{ErrorKind, ReboundError, TransportError};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ReboundError);

impl From<InfraError> for ReboundError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ReboundError> for InfraError {
    fn from(value: ReboundError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ReboundError (client construction) */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let err = if value.is_builder() {
            ReboundError::Config(format!("invalid HTTP client configuration: {value}"))
        } else {
            ReboundError::Network(format!("http error: {value}"))
        };
        InfraError(err)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError (per attempt) */
/* -------------------------------------------------------------------------- */

/// Tag a reqwest failure with the kind the retry policy classifies on.
///
/// Timeouts are checked first: reqwest reports a timed-out connect as both
/// `is_connect` and `is_timeout`.
pub(crate) fn classify_reqwest_error(err: &HttpError) -> TransportError {
    let kind = if err.is_timeout() {
        ErrorKind::TIMEOUT
    } else if err.is_builder() {
        ErrorKind::INVALID_REQUEST
    } else if err.is_decode() {
        ErrorKind::DECODE
    } else {
        // connect, request, body, redirect and anything reqwest adds later
        ErrorKind::TRANSPORT
    };
    TransportError::new(kind, describe(err))
}

/// Full error chain; reqwest's own message rarely names the root cause
fn describe(err: &HttpError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
