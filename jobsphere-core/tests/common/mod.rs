//! Shared helpers for the orchestration integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use jobsphere_core::http::{ProviderRequest, RawResponse, Transport, TransportFailure};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Route engine logs to the test harness; `RUST_LOG=jobsphere_core=debug` shows them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One scripted reaction of a provider
#[derive(Debug, Clone)]
pub enum Step {
    Respond(RawResponse),
    Delayed(Duration, RawResponse),
    Fail(TransportFailure),
    Hang,
}

impl Step {
    pub fn ok(body: impl Into<String>) -> Self {
        Step::Respond(RawResponse::new(200, body))
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Step::Respond(RawResponse::new(status, body))
    }

    pub fn json(body: Value) -> Self {
        Step::ok(body.to_string())
    }
}

/// Transport replaying scripted steps per provider id
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    sent: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, provider_id: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(provider_id.to_string())
            .or_default()
            .extend(steps);
        self
    }

    /// Requests received so far, in order
    pub fn sent(&self) -> Vec<ProviderRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls_to(&self, provider_id: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.provider_id == provider_id)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ProviderRequest) -> Result<RawResponse, TransportFailure> {
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.provider_id)
            .and_then(VecDeque::pop_front);
        self.sent.lock().unwrap().push(request);

        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Step::Fail(failure)) => Err(failure),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(TransportFailure::Network("unscripted call".to_string())),
        }
    }
}

/// Gemini `generateContent` envelope around generated text
pub fn gemini_text(text: &str) -> Step {
    Step::json(json!({
        "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
    }))
}

/// OpenAI-compatible chat envelope around generated text
pub fn chat_text(text: &str) -> Step {
    Step::json(json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
    }))
}

/// Remotive response listing `(title, company, url)` postings
pub fn remotive_jobs(jobs: &[(&str, &str, &str)]) -> Step {
    let jobs: Vec<Value> = jobs
        .iter()
        .enumerate()
        .map(|(i, (title, company, url))| {
            json!({"id": i + 1, "title": title, "company_name": company, "url": url,
                   "candidate_required_location": "Worldwide", "tags": ["rust"]})
        })
        .collect();
    Step::json(json!({"job-count": jobs.len(), "jobs": jobs}))
}

/// The Muse response listing `(title, company, url)` postings
pub fn muse_jobs(jobs: &[(&str, &str, &str)]) -> Step {
    let results: Vec<Value> = jobs
        .iter()
        .enumerate()
        .map(|(i, (title, company, url))| {
            json!({"id": 100 + i, "name": title, "company": {"name": company},
                   "locations": [{"name": "Flexible / Remote"}], "refs": {"landing_page": url}})
        })
        .collect();
    Step::json(json!({"page": 0, "page_count": 1, "results": results}))
}

pub fn quota_exhausted() -> Step {
    Step::status(
        429,
        json!({"error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).",
                         "status": "RESOURCE_EXHAUSTED"}})
        .to_string(),
    )
}
