//! Transport tests against a local mock server

use jobsphere_core::config::ConnectionConfig;
use jobsphere_core::http::{HttpClient, TransportClient};
use jobsphere_core::prompts;
use jobsphere_core::protocol::{AttemptOutcome, JobQuery};
use jobsphere_core::providers::{ProviderDescriptor, ProviderKind};
use jobsphere_core::TaskDescriptor;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn client() -> TransportClient {
    TransportClient::new(Arc::new(HttpClient::new().unwrap()))
}

fn gemini(server: &MockServer) -> ProviderDescriptor {
    ProviderDescriptor::new("gemini", ProviderKind::Gemini)
        .with_endpoint(server.uri())
        .with_model("gemini-test")
        .with_credential("AIza-test-key")
}

fn groq(server: &MockServer) -> ProviderDescriptor {
    ProviderDescriptor::new("groq", ProviderKind::Groq)
        .with_endpoint(format!("{}/openai/v1/chat/completions", server.uri()))
        .with_credential("gsk-test-key")
}

fn skills_task() -> TaskDescriptor {
    prompts::suggest_skills("Rust developer", &["Rust".to_string()])
}

#[tokio::test]
async fn test_gemini_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "AIza-test-key"))
        .and(header_exists("x-request-id"))
        .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 2048}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "[\"Tokio\", \"Kubernetes\"]"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client()
        .call(&gemini(&server), 0, &skills_task(), TIMEOUT)
        .await;

    assert_eq!(outcome.attempt.outcome, AttemptOutcome::Success);
    assert_eq!(outcome.attempt.http_status, Some(200));
    assert!(outcome.payload.is_some());
}

#[tokio::test]
async fn test_retry_after_header_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "7")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let outcome = client().call(&groq(&server), 0, &skills_task(), TIMEOUT).await;

    assert_eq!(outcome.attempt.outcome, AttemptOutcome::RateLimited);
    assert_eq!(outcome.attempt.retry_after_ms, Some(7000));
    assert!(outcome.payload.is_none());
}

#[tokio::test]
async fn test_quota_marker_beats_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "Quota exceeded for aiplatform.googleapis.com",
                      "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&server)
        .await;

    let outcome = client()
        .call(&gemini(&server), 0, &skills_task(), TIMEOUT)
        .await;

    assert_eq!(outcome.attempt.outcome, AttemptOutcome::RateLimited);
    assert_eq!(outcome.attempt.http_status, Some(403));
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer gsk-test-key"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Invalid API Key gsk-test-key"}})),
        )
        .mount(&server)
        .await;

    let outcome = client().call(&groq(&server), 0, &skills_task(), TIMEOUT).await;

    assert_eq!(outcome.attempt.outcome, AttemptOutcome::AuthError);
    let raw = outcome.attempt.raw_payload.unwrap();
    assert!(!raw.contains("gsk-test-key"));
    assert!(!outcome.attempt.detail.unwrap().contains("gsk-test-key"));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_string("{}"),
        )
        .mount(&server)
        .await;

    let outcome = client()
        .call(&groq(&server), 0, &skills_task(), Duration::from_millis(200))
        .await;

    assert_eq!(outcome.attempt.outcome, AttemptOutcome::Timeout);
    assert!(outcome.attempt.duration_ms < 3000);
}

#[tokio::test]
async fn test_adzuna_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gb/search/1"))
        .and(query_param("app_id", "app-id"))
        .and(query_param("app_key", "app-key"))
        .and(query_param("what", "rust engineer"))
        .and(query_param("where", "London"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "results": [{
                "id": "4242",
                "title": "Rust Engineer",
                "company": {"display_name": "Acme"},
                "location": {"display_name": "London, UK"},
                "redirect_url": "https://www.adzuna.co.uk/jobs/land/ad/4242",
                "salary_min": 70000.0,
                "salary_max": 90000.0,
                "created": "2026-10-01T09:00:00Z"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adzuna = ProviderDescriptor::new("adzuna", ProviderKind::Adzuna)
        .with_endpoint(server.uri())
        .with_credential("app-id:app-key");
    let task = prompts::job_search(JobQuery::new("rust engineer").with_location("London"));

    let outcome = client().call(&adzuna, 0, &task, TIMEOUT).await;

    assert_eq!(outcome.attempt.outcome, AttemptOutcome::Success);
    assert!(outcome.payload.is_some());
}

#[tokio::test]
async fn test_oversized_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let config = ConnectionConfig {
        max_response_bytes: 1024,
        ..ConnectionConfig::default()
    };
    let client = TransportClient::new(Arc::new(HttpClient::with_config(&config).unwrap()));
    let remotive =
        ProviderDescriptor::new("remotive", ProviderKind::Remotive).with_endpoint(server.uri());
    let task = prompts::job_search(JobQuery::new("rust"));

    let outcome = client.call(&remotive, 0, &task, TIMEOUT).await;

    assert_eq!(outcome.attempt.outcome, AttemptOutcome::TransportError);
    assert!(outcome.attempt.detail.unwrap().contains("exceeds maximum 1024"));
}

#[tokio::test]
async fn test_connection_refused() {
    let remotive =
        ProviderDescriptor::new("remotive", ProviderKind::Remotive)
            .with_endpoint("http://127.0.0.1:1");
    let task = prompts::job_search(JobQuery::new("rust"));

    let outcome = client().call(&remotive, 0, &task, TIMEOUT).await;

    assert_eq!(outcome.attempt.outcome, AttemptOutcome::TransportError);
    assert!(outcome.attempt.http_status.is_none());
}
