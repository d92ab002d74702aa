//! Immutable description of one logical HTTP call.
//!
//! A [`RequestDescriptor`] is built once and replayed verbatim by every retry
//! attempt. Structured payloads are serialized when the descriptor is built,
//! so every attempt sends the same bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ReboundError, Result};

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ReboundError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(ReboundError::InvalidInput(format!("unsupported HTTP method: {other}"))),
        }
    }
}

/// How the transport should treat the response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Hand back the body bytes untouched
    #[default]
    Raw,
    /// Read the whole body and parse it as JSON before resolving
    Preload,
}

/// One logical HTTP call, shared read-only across all of its attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    id: Uuid,
    method: HttpMethod,
    url: String,
    query: Vec<(String, String)>,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    response_mode: ResponseMode,
}

impl RequestDescriptor {
    /// Start building a descriptor for `method` and `url`.
    ///
    /// The URL is not validated here; the transport rejects malformed URLs
    /// with an `invalid-request` error.
    pub fn builder(method: HttpMethod, url: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::new(method, url.into())
    }

    pub fn get(url: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(HttpMethod::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> RequestDescriptorBuilder {
        Self::builder(HttpMethod::Delete, url)
    }

    /// Correlation id, stable across attempts
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Timeout requested by the caller for each attempt
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.response_mode
    }
}

/// Builder for [`RequestDescriptor`].
#[derive(Debug)]
pub struct RequestDescriptorBuilder {
    method: HttpMethod,
    url: String,
    query: Vec<(String, String)>,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    response_mode: ResponseMode,
}

impl RequestDescriptorBuilder {
    fn new(method: HttpMethod, url: String) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            response_mode: ResponseMode::Raw,
        }
    }

    /// Set a header; header names are stored lowercase.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Append a query parameter. Order is preserved.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Attach an opaque body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `payload` as JSON and attach it as the body.
    ///
    /// # Errors
    /// Returns `ReboundError::InvalidInput` if `payload` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(payload)
            .map_err(|e| ReboundError::InvalidInput(format!("failed to encode JSON body: {e}")))?;
        self.body = Some(Bytes::from(encoded));
        self.headers
            .entry("content-type".to_string())
            .or_insert_with(|| "application/json".to_string());
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    /// Shorthand for `response_mode(ResponseMode::Preload)`
    pub fn preload(self) -> Self {
        self.response_mode(ResponseMode::Preload)
    }

    pub fn build(self) -> RequestDescriptor {
        RequestDescriptor {
            id: Uuid::now_v7(),
            method: self.method,
            url: self.url,
            query: self.query,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
            response_mode: self.response_mode,
        }
    }
}
