//! Classifiable transport failures.
//!
//! Retry decisions never inspect error types. A transport reports a failure
//! as a [`TransportError`] tagged with an [`ErrorKind`], and the retry policy
//! matches that tag against its configured set.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag classifying a transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorKind(Cow<'static, str>);

impl ErrorKind {
    /// Connection reset, refused, DNS failure, broken body stream
    pub const TRANSPORT: Self = Self(Cow::Borrowed("transport-exception"));
    /// The attempt exceeded its timeout
    pub const TIMEOUT: Self = Self(Cow::Borrowed("timeout"));
    /// A preloaded body could not be parsed
    pub const DECODE: Self = Self(Cow::Borrowed("decode"));
    /// The request could not be built (bad URL, bad header)
    pub const INVALID_REQUEST: Self = Self(Cow::Borrowed("invalid-request"));

    /// Create a custom kind tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ErrorKind {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for ErrorKind {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

/// A failure reported by the transport before a response was produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: ErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into() }
    }

    /// Shorthand for an [`ErrorKind::TRANSPORT`] failure
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TRANSPORT, message)
    }

    /// Shorthand for an [`ErrorKind::TIMEOUT`] failure
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TIMEOUT, message)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
