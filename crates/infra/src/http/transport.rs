use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rebound_core::Transport;
use rebound_domain::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT,
};
use rebound_domain::{
    ErrorKind, HttpMethod, RawResponse, ReboundError, RequestDescriptor, ResponseMode, Result,
    TransportError, TransportSettings,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use tracing::debug;

use crate::errors::{classify_reqwest_error, InfraError};

/// [`Transport`] backed by a shared `reqwest` connection pool.
///
/// Sends exactly one attempt per call; retrying is the engine's job.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Transport configured from the `[transport]` config section
    pub fn from_settings(settings: &TransportSettings) -> Result<Self> {
        Self::builder()
            .timeout(settings.request_timeout()?)
            .connect_timeout(settings.connect_timeout()?)
            .user_agent(settings.user_agent.clone())
            .default_headers(settings.default_headers.clone())
            .build()
    }

    /// Wrap an already configured reqwest client
    pub fn from_client(client: ReqwestClient) -> Self {
        Self { client }
    }

    fn build_request(
        &self,
        request: &RequestDescriptor,
        timeout: Option<Duration>,
    ) -> std::result::Result<reqwest::Request, TransportError> {
        let mut builder = self.client.request(to_reqwest_method(request.method()), request.url());

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            // Bytes clones share the buffer, so every attempt sends the same bytes
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder.build().map_err(|err| classify_reqwest_error(&err))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Option<Duration>,
    ) -> std::result::Result<RawResponse, TransportError> {
        let http_request = self.build_request(request, timeout)?;
        let request_id = request.id();
        let method = request.method();
        let url = http_request.url().clone();

        let response = self.client.execute(http_request).await.map_err(|err| {
            debug!(%request_id, %method, %url, error = %err, "HTTP request failed");
            classify_reqwest_error(&err)
        })?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await.map_err(|err| classify_reqwest_error(&err))?;
        debug!(%request_id, %method, %url, status, bytes = body.len(), "received HTTP response");

        let raw = RawResponse::new(status, headers, body);
        match request.response_mode() {
            ResponseMode::Raw => Ok(raw),
            ResponseMode::Preload => preload(raw),
        }
    }
}

/// Parse a successful, non-empty body as JSON.
///
/// Error responses are left raw so an HTML 503 page stays a retryable status
/// instead of becoming a decode failure.
fn preload(raw: RawResponse) -> std::result::Result<RawResponse, TransportError> {
    if !raw.is_success() || raw.body().is_empty() {
        return Ok(raw);
    }
    match serde_json::from_slice(raw.body()) {
        Ok(data) => Ok(raw.with_data(data)),
        Err(err) => Err(TransportError::new(
            ErrorKind::DECODE,
            format!("response body is not valid JSON: {err}"),
        )),
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        // Repeated headers fold into one comma-separated value
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
    default_headers: BTreeMap<String, String>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: BTreeMap::new(),
        }
    }
}

impl ReqwestTransportBuilder {
    /// Client-wide timeout; a per-attempt timeout on the call replaces it
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn default_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.default_headers.extend(headers);
        self
    }

    pub fn build(self) -> Result<ReqwestTransport> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                ReboundError::Config(format!("invalid default header name '{name}': {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                ReboundError::Config(format!("invalid value for default header '{name}': {err}"))
            })?;
            headers.insert(name, value);
        }

        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent)
            .default_headers(headers)
            .no_proxy()
            .build()
            .map_err(|err| ReboundError::from(InfraError::from(err)))?;

        Ok(ReqwestTransport { client })
    }
}
