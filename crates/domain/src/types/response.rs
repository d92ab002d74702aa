//! Response produced by the transport.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::errors::{ReboundError, Result};

/// A complete HTTP response as seen by the retry layer.
///
/// The retry layer only looks at [`status`](Self::status); everything else is
/// passed through to the caller untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Bytes,
    data: Option<serde_json::Value>,
}

impl RawResponse {
    pub fn new(status: u16, headers: BTreeMap<String, String>, body: impl Into<Bytes>) -> Self {
        let headers = headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        Self { status, headers, body: body.into(), data: None }
    }

    /// Response with a status code and no headers or body
    pub fn with_status(status: u16) -> Self {
        Self::new(status, BTreeMap::new(), Bytes::new())
    }

    /// Attach the parsed JSON document of a preloaded body
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parsed JSON document, present when the request asked for preloading
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Body decoded as UTF-8 text.
    ///
    /// # Errors
    /// Returns `ReboundError::InvalidInput` when the body is not valid UTF-8.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|e| ReboundError::InvalidInput(format!("response body is not UTF-8: {e}")))
    }

    /// Deserialize the body as JSON into `T`.
    ///
    /// Uses the preloaded document when one is present.
    ///
    /// # Errors
    /// Returns `ReboundError::InvalidInput` when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let decoded = match &self.data {
            Some(data) => serde_json::from_value(data.clone()),
            None => serde_json::from_slice(&self.body),
        };
        decoded.map_err(|e| ReboundError::InvalidInput(format!("failed to decode JSON body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = BTreeMap::new();
        headers.insert("Retry-After".to_string(), "3".to_string());
        let response = RawResponse::new(503, headers, "busy");

        assert_eq!(response.header("retry-after"), Some("3"));
        assert_eq!(response.header("RETRY-AFTER"), Some("3"));
        assert!(response.is_server_error());
        assert!(!response.is_success());
    }

    #[test]
    fn json_prefers_preloaded_document() {
        let response =
            RawResponse::new(200, BTreeMap::new(), "ignored").with_data(json!({"id": 7}));
        assert_eq!(response.json::<Item>().unwrap(), Item { id: 7 });
    }

    #[test]
    fn json_falls_back_to_body() {
        let response = RawResponse::new(200, BTreeMap::new(), r#"{"id": 3}"#);
        assert_eq!(response.json::<Item>().unwrap(), Item { id: 3 });
        assert_eq!(response.text().unwrap(), r#"{"id": 3}"#);

        let broken = RawResponse::new(200, BTreeMap::new(), "not json");
        assert!(matches!(broken.json::<Item>(), Err(ReboundError::InvalidInput(_))));
    }
}
