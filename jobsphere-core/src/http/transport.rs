//! Bounded, classified provider calls

use super::error::classify_response;
use super::{Transport, TransportFailure};
use crate::config::{redact_payload, DEFAULT_PAYLOAD_BUDGET};
use crate::normalize::Payload;
use crate::protocol::{Attempt, AttemptOutcome, TaskDescriptor};
use crate::providers::{ProviderDescriptor, ProviderError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Result of one call: the classified attempt plus the extracted payload on success
#[derive(Debug)]
pub struct CallOutcome {
    pub attempt: Attempt,
    pub payload: Option<Payload>,
}

impl CallOutcome {
    fn failed(mut attempt: Attempt, outcome: AttemptOutcome, detail: impl Into<String>) -> Self {
        attempt.outcome = outcome;
        attempt.detail = Some(detail.into());
        Self {
            attempt,
            payload: None,
        }
    }
}

/// Performs exactly one bounded call per invocation and never retries
#[derive(Clone)]
pub struct TransportClient {
    transport: Arc<dyn Transport>,
    payload_budget: usize,
}

impl fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportClient")
            .field("payload_budget", &self.payload_budget)
            .finish_non_exhaustive()
    }
}

impl TransportClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            payload_budget: DEFAULT_PAYLOAD_BUDGET,
        }
    }

    /// Limit how much of a failing body is kept on the attempt
    pub fn with_payload_budget(mut self, budget: usize) -> Self {
        self.payload_budget = budget;
        self
    }

    /// Call `provider` with one credential, giving up after `timeout`.
    ///
    /// The call never fails: every problem is folded into the attempt's
    /// outcome. Failing bodies are kept redacted of the provider's
    /// credentials and truncated.
    pub async fn call(
        &self,
        provider: &ProviderDescriptor,
        credential_index: usize,
        task: &TaskDescriptor,
        timeout: Duration,
    ) -> CallOutcome {
        let mut attempt = Attempt::begin(provider.id.clone(), credential_index);
        let started = Instant::now();

        let request = match provider.kind.build_request(
            provider,
            provider.credential(credential_index),
            task,
            attempt.request_id,
            timeout,
        ) {
            Ok(request) => request,
            Err(err) => {
                let outcome = match err {
                    ProviderError::MissingCredential { .. }
                    | ProviderError::InvalidCredential { .. } => AttemptOutcome::AuthError,
                    _ => AttemptOutcome::TransportError,
                };
                return CallOutcome::failed(attempt, outcome, err.to_string());
            }
        };

        let sent = tokio::time::timeout(timeout, self.transport.send(request)).await;
        attempt.duration_ms = started.elapsed().as_millis() as u64;

        let response = match sent {
            Err(_) | Ok(Err(TransportFailure::Timeout)) => {
                debug!(
                    provider = %provider.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "provider call timed out"
                );
                return CallOutcome::failed(
                    attempt,
                    AttemptOutcome::Timeout,
                    format!("no response within {}ms", timeout.as_millis()),
                );
            }
            Ok(Err(failure)) => {
                return CallOutcome::failed(
                    attempt,
                    AttemptOutcome::TransportError,
                    failure.to_string(),
                );
            }
            Ok(Ok(response)) => response,
        };

        let classification = classify_response(&response, provider.kind.quota_markers());
        attempt.http_status = Some(response.status);
        attempt.retry_after_ms = classification.retry_after.map(|d| d.as_millis() as u64);

        if !classification.outcome.is_success() {
            attempt.raw_payload = Some(self.redact(provider, &response.body));
            let detail = self.redact(provider, &classification.detail.unwrap_or_default());
            debug!(
                provider = %provider.id,
                status = response.status,
                outcome = %classification.outcome,
                "provider call failed"
            );
            return CallOutcome::failed(attempt, classification.outcome, detail);
        }

        match provider.kind.extract(task, &response.body) {
            Ok(payload) => CallOutcome {
                attempt,
                payload: Some(payload),
            },
            Err(err) => {
                attempt.raw_payload = Some(self.redact(provider, &response.body));
                CallOutcome::failed(attempt, AttemptOutcome::MalformedResponse, err.to_string())
            }
        }
    }

    /// Redact and truncate a body for the attempt log
    pub fn redact(&self, provider: &ProviderDescriptor, body: &str) -> String {
        redact_payload(body, &provider.credentials, self.payload_budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ProviderRequest, RawResponse};
    use crate::protocol::{JobQuery, PromptPayload, TaskType};
    use crate::providers::{should_retry, ProviderKind};
    use async_trait::async_trait;

    struct Fixed(Result<RawResponse, TransportFailure>);

    #[async_trait]
    impl Transport for Fixed {
        async fn send(&self, _request: ProviderRequest) -> Result<RawResponse, TransportFailure> {
            self.0.clone()
        }
    }

    struct Hang;

    #[async_trait]
    impl Transport for Hang {
        async fn send(&self, _request: ProviderRequest) -> Result<RawResponse, TransportFailure> {
            std::future::pending().await
        }
    }

    fn gemini() -> ProviderDescriptor {
        ProviderDescriptor::new("gemini", ProviderKind::Gemini).with_credential("AIza-secret-key")
    }

    fn answer_task() -> TaskDescriptor {
        TaskDescriptor::prompt(TaskType::GenerateAnswer, PromptPayload::new("hi"))
    }

    #[tokio::test]
    async fn test_failure_body_is_redacted() {
        let body = r#"{"error": {"message": "API key AIza-secret-key not valid"}}"#;
        let client = TransportClient::new(Arc::new(Fixed(Ok(RawResponse::new(401, body)))));
        let outcome = client
            .call(&gemini(), 0, &answer_task(), Duration::from_secs(1))
            .await;

        assert_eq!(outcome.attempt.outcome, AttemptOutcome::AuthError);
        assert_eq!(outcome.attempt.http_status, Some(401));
        let raw = outcome.attempt.raw_payload.unwrap();
        assert!(!raw.contains("AIza-secret-key"));
        assert!(outcome.payload.is_none());
    }

    #[tokio::test]
    async fn test_success_extracts_payload() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]}}]}"#;
        let client = TransportClient::new(Arc::new(Fixed(Ok(RawResponse::new(200, body)))));
        let outcome = client
            .call(&gemini(), 0, &answer_task(), Duration::from_secs(1))
            .await;

        assert_eq!(outcome.attempt.outcome, AttemptOutcome::Success);
        assert!(outcome.attempt.raw_payload.is_none());
        assert!(matches!(outcome.payload, Some(Payload::Text(ref t)) if t == "hello"));
    }

    #[tokio::test]
    async fn test_foreign_envelope_is_malformed() {
        let client = TransportClient::new(Arc::new(Fixed(Ok(RawResponse::new(200, "<html>")))));
        let outcome = client
            .call(&gemini(), 0, &answer_task(), Duration::from_secs(1))
            .await;
        assert_eq!(outcome.attempt.outcome, AttemptOutcome::MalformedResponse);
        assert_eq!(outcome.attempt.raw_payload.as_deref(), Some("<html>"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let client = TransportClient::new(Arc::new(Hang));
        let outcome = client
            .call(&gemini(), 0, &answer_task(), Duration::from_millis(250))
            .await;
        assert_eq!(outcome.attempt.outcome, AttemptOutcome::Timeout);
        assert!(outcome.attempt.duration_ms >= 250);
    }

    #[tokio::test]
    async fn test_network_failure() {
        let client = TransportClient::new(Arc::new(Fixed(Err(TransportFailure::Connect(
            "refused".to_string(),
        )))));
        let task = TaskDescriptor::job_search(JobQuery::new("rust"));
        let remotive = ProviderDescriptor::new("remotive", ProviderKind::Remotive);
        let outcome = client.call(&remotive, 0, &task, Duration::from_secs(1)).await;
        assert_eq!(outcome.attempt.outcome, AttemptOutcome::TransportError);
        assert_eq!(outcome.attempt.detail.as_deref(), Some("connection failed: refused"));
    }

    #[tokio::test]
    async fn test_missing_credential_is_auth_error() {
        let client = TransportClient::new(Arc::new(Fixed(Ok(RawResponse::new(200, "{}")))));
        let provider = ProviderDescriptor::new("openai", ProviderKind::OpenAi);
        let outcome = client
            .call(&provider, 0, &answer_task(), Duration::from_secs(1))
            .await;
        assert_eq!(outcome.attempt.outcome, AttemptOutcome::AuthError);
    }

    #[tokio::test]
    async fn test_malformed_credential_is_auth_error() {
        let client = TransportClient::new(Arc::new(Fixed(Ok(RawResponse::new(200, "{}")))));
        let adzuna =
            ProviderDescriptor::new("adzuna", ProviderKind::Adzuna).with_credential("no-colon");
        let task = TaskDescriptor::job_search(JobQuery::new("rust"));
        let outcome = client.call(&adzuna, 0, &task, Duration::from_secs(1)).await;

        assert_eq!(outcome.attempt.outcome, AttemptOutcome::AuthError);
        assert!(outcome.attempt.http_status.is_none());
        assert!(!should_retry(outcome.attempt.outcome, 0, 3));
    }
}
