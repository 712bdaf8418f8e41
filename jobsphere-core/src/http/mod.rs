//! HTTP layer for calling external providers
//!
//! This module separates raw I/O from classification:
//! - [`Transport`] sends one prepared request and returns the raw response
//! - [`TransportClient`] bounds the call in time and turns the response into
//!   a classified [`Attempt`](crate::protocol::Attempt)
//! - [`HttpClient`] is the reqwest-backed transport used in production

pub mod client;
pub mod error;
pub mod transport;

pub use client::HttpClient;
pub use error::{classify_response, parse_retry_after, Classification};
pub use transport::{CallOutcome, TransportClient};

use crate::config::{is_sensitive_name, REDACTED};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// HTTP method of a provider request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A fully prepared provider request, credentials included
#[derive(Clone)]
pub struct ProviderRequest {
    pub provider_id: String,

    /// Unique request ID for correlation
    pub request_id: Uuid,

    pub method: HttpMethod,

    /// Endpoint without query string
    pub url: String,

    pub headers: Vec<(String, String)>,

    pub query: Vec<(String, String)>,

    /// JSON body for POST requests
    pub body: Option<Value>,

    /// Per-call timeout
    pub timeout: Duration,
}

impl ProviderRequest {
    pub fn new(
        provider_id: impl Into<String>,
        request_id: Uuid,
        method: HttpMethod,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            request_id,
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a header, case-insensitive
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Value of a query parameter
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct Redacted<'a>(&'a [(String, String)]);

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(name, value)| {
                let shown = if is_sensitive_name(name) { REDACTED } else { value.as_str() };
                (name, shown)
            }))
            .finish()
    }
}

impl fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRequest")
            .field("provider_id", &self.provider_id)
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &Redacted(&self.headers))
            .field("query", &Redacted(&self.query))
            .field("has_body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Unclassified response of a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,

    /// Parsed `Retry-After` header
    pub retry_after: Option<Duration>,

    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// I/O failure below HTTP status classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("response size {size} exceeds maximum {max}")]
    ResponseTooLarge { size: usize, max: usize },

    #[error("network error: {0}")]
    Network(String),
}

/// Sends prepared requests
///
/// Implementations perform I/O only; timeouts, classification and retries are
/// applied by [`TransportClient`]. Dropping the returned future must cancel the
/// in-flight call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<RawResponse, TransportFailure>;
}
