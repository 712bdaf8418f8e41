//! HTTP client implementation using reqwest

use super::error::parse_retry_after;
use super::{HttpMethod, ProviderRequest, RawResponse, Transport, TransportFailure};
use crate::config::ConnectionConfig;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default user agent
const USER_AGENT: &str = concat!("jobsphere/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_response_size", &self.max_response_size)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, TransportFailure> {
        Self::with_config(&ConnectionConfig::default())
    }

    /// Create a new HTTP client from connection settings
    pub fn with_config(config: &ConnectionConfig) -> Result<Self, TransportFailure> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.keepalive_secs))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| {
                TransportFailure::Network(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: config.max_response_bytes,
        })
    }

    /// Map a reqwest failure without echoing the URL, whose query may hold keys
    fn map_error(err: reqwest::Error) -> TransportFailure {
        if err.is_timeout() {
            TransportFailure::Timeout
        } else if err.is_connect() {
            TransportFailure::Connect(err.without_url().to_string())
        } else {
            TransportFailure::Network(err.without_url().to_string())
        }
    }

    /// Check response size to prevent OOM
    fn check_size(&self, size: usize) -> Result<(), TransportFailure> {
        if size > self.max_response_size {
            return Err(TransportFailure::ResponseTooLarge {
                size,
                max: self.max_response_size,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: ProviderRequest) -> Result<RawResponse, TransportFailure> {
        let request_id = request.request_id;
        debug!(
            provider = %request.provider_id,
            request_id = %request_id,
            url = %request.url,
            "sending provider request"
        );

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout)
        .header("X-Request-ID", request_id.to_string());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let failure = Self::map_error(e);
            warn!(
                provider = %request.provider_id,
                request_id = %request_id,
                error = %failure,
                "provider request failed"
            );
            failure
        })?;

        if let Some(length) = response.content_length() {
            self.check_size(length as usize)?;
        }

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);

        let body = response.text().await.map_err(Self::map_error)?;
        self.check_size(body.len())?;

        debug!(
            provider = %request.provider_id,
            request_id = %request_id,
            status,
            bytes = body.len(),
            "provider responded"
        );

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}
