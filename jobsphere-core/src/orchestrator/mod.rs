//! The engine's public surface
//!
//! [`Orchestrator::orchestrate`] runs one task against the configured
//! providers with either strategy:
//!
//! - CASCADE tries providers one after another in priority order and stops
//!   at the first normalized answer
//! - FANOUT queries every eligible provider at once and merges what arrives
//!   before the deadline
//!
//! Provider failures never escape a run. They are recorded in the
//! [`AttemptLog`] and folded into the provider's health; the only terminal
//! signal is `status = Failure` with a [`FailureReason`].

mod cascade;
mod fanout;
pub mod merge;

pub use merge::{DedupKey, ResultMerger, SourceList};

use crate::config::{
    ConfigError, ConfigValidator, EngineConfig, ValidationError, DEFAULT_PAYLOAD_BUDGET,
};
use crate::http::{CallOutcome, HttpClient, Transport, TransportClient, TransportFailure};
use crate::normalize::{ExpectedSchema, Normalizer};
use crate::protocol::{
    Attempt, AttemptLog, AttemptOutcome, FailureReason, OrchestrationResult, OrchestrationStatus,
    Strategy, TaskDescriptor, TaskType,
};
use crate::providers::{
    Clock, CooldownPolicy, CredentialHealth, ProviderDescriptor, QuotaTracker, SystemClock,
    UsageStats,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Default cap on merged job items
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Default ceiling on any run's deadline
pub const DEFAULT_MAX_DEADLINE: Duration = Duration::from_secs(300);

/// Errors raised while building an engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),

    #[error("failed to set up transport: {0}")]
    Transport(#[from] TransportFailure),

    #[error("provider id '{0}' is declared twice")]
    DuplicateProvider(String),
}

/// Runs tasks against the configured providers
#[derive(Debug)]
pub struct Orchestrator {
    /// In declaration order
    providers: Vec<Arc<ProviderDescriptor>>,
    tracker: Arc<QuotaTracker>,
    client: TransportClient,
    normalizer: Normalizer,
    max_results: usize,
    max_deadline: Duration,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Engine over the enabled providers of a configuration, using reqwest
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        ConfigValidator::new().allow_empty().validate(config)?;
        let transport = HttpClient::with_config(&config.connection)?;

        Self::builder()
            .providers(
                config
                    .providers
                    .iter()
                    .filter(|provider| provider.enabled)
                    .map(ProviderDescriptor::from_config),
            )
            .transport(Arc::new(transport))
            .policy(CooldownPolicy::from(&config.circuit))
            .max_results(config.defaults.max_results)
            .max_deadline(Duration::from_millis(config.defaults.deadline_ms))
            .build()
    }

    /// Run one task to success, exhaustion or deadline
    pub async fn orchestrate(&self, task: &TaskDescriptor) -> OrchestrationResult {
        let run = Run::start(task.task_type, task.deadline.min(self.max_deadline));
        let span = info_span!(
            "orchestrate",
            run_id = %run.id,
            task = %task.task_type,
            strategy = ?task.strategy
        );

        async move {
            let result = match task.strategy {
                Strategy::Cascade => self.run_cascade(task, run).await,
                Strategy::Fanout => self.run_fanout(task, run).await,
            };
            match result.status {
                OrchestrationStatus::Failure => warn!(
                    reason = ?result.failure_reason,
                    attempts = result.attempts.len(),
                    elapsed_ms = result.elapsed_ms,
                    "orchestration failed"
                ),
                _ => info!(
                    served_by = ?result.served_by,
                    attempts = result.attempts.len(),
                    elapsed_ms = result.elapsed_ms,
                    "orchestration succeeded"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    pub fn providers(&self) -> &[Arc<ProviderDescriptor>] {
        &self.providers
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers
            .iter()
            .find(|provider| provider.id == id)
            .map(Arc::as_ref)
    }

    pub fn tracker(&self) -> &Arc<QuotaTracker> {
        &self.tracker
    }

    pub fn usage_snapshot(&self) -> HashMap<String, UsageStats> {
        self.tracker.usage_snapshot()
    }

    pub fn health_snapshot(&self) -> Vec<CredentialHealth> {
        self.tracker.health_snapshot()
    }

    /// Providers serving the task type, by priority then declaration order
    pub fn candidates(&self, task_type: TaskType) -> Vec<Arc<ProviderDescriptor>> {
        let mut candidates: Vec<_> = self
            .providers
            .iter()
            .filter(|provider| provider.can_serve(task_type))
            .cloned()
            .collect();
        candidates.sort_by_key(|provider| provider.priority_for(task_type));
        candidates
    }

    /// Normalize a call's payload; a payload that cannot be normalized turns
    /// the attempt into `MalformedResponse`
    fn settle(
        &self,
        provider: &ProviderDescriptor,
        call: CallOutcome,
        schema: &ExpectedSchema,
    ) -> (Attempt, Option<Value>) {
        let CallOutcome { mut attempt, payload } = call;
        let Some(payload) = payload else {
            return (attempt, None);
        };

        match self.normalizer.normalize_payload(payload, schema) {
            Ok(value) => (attempt, Some(value)),
            Err(err) => {
                debug!(provider = %provider.id, error = %err, "payload rejected");
                attempt.outcome = AttemptOutcome::MalformedResponse;
                attempt.detail = Some(err.to_string());
                attempt.raw_payload = Some(self.client.redact(provider, &err.raw_payload));
                (attempt, None)
            }
        }
    }

    /// Fold an attempt into the tracker. A timeout forced by the run deadline
    /// rather than the provider's own timeout leaves health untouched.
    fn record(&self, attempt: &Attempt, deadline_capped: bool) {
        if deadline_capped && attempt.outcome == AttemptOutcome::Timeout {
            debug!(
                provider = %attempt.provider_id,
                credential = attempt.credential_index,
                "timeout caused by run deadline, health unchanged"
            );
            return;
        }
        self.tracker.record_outcome(
            &attempt.provider_id,
            attempt.credential_index,
            attempt.outcome,
            attempt.retry_after(),
        );
    }
}

/// Book-keeping of one run
struct Run {
    id: Uuid,
    task_type: TaskType,
    started: Instant,
    deadline: Instant,
    attempts: AttemptLog,
}

impl Run {
    fn start(task_type: TaskType, budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            id: Uuid::new_v4(),
            task_type,
            started,
            deadline: started + budget,
            attempts: AttemptLog::new(),
        }
    }

    /// Time left before the deadline, `None` once it has passed
    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    fn succeed(self, data: Value, served_by: Vec<String>) -> OrchestrationResult {
        self.finish(OrchestrationStatus::Success, Some(data), served_by, None)
    }

    fn fail(self, reason: FailureReason) -> OrchestrationResult {
        self.finish(OrchestrationStatus::Failure, None, Vec::new(), Some(reason))
    }

    fn finish(
        self,
        status: OrchestrationStatus,
        data: Option<Value>,
        served_by: Vec<String>,
        failure_reason: Option<FailureReason>,
    ) -> OrchestrationResult {
        OrchestrationResult {
            run_id: self.id,
            task_type: self.task_type,
            status,
            data,
            served_by,
            attempts: self.attempts,
            failure_reason,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    providers: Vec<ProviderDescriptor>,
    transport: Option<Arc<dyn Transport>>,
    tracker: Option<Arc<QuotaTracker>>,
    policy: CooldownPolicy,
    clock: Option<Arc<dyn Clock>>,
    normalizer: Normalizer,
    payload_budget: usize,
    max_results: usize,
    max_deadline: Duration,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            transport: None,
            tracker: None,
            policy: CooldownPolicy::default(),
            clock: None,
            normalizer: Normalizer::new(),
            payload_budget: DEFAULT_PAYLOAD_BUDGET,
            max_results: DEFAULT_MAX_RESULTS,
            max_deadline: DEFAULT_MAX_DEADLINE,
        }
    }

    pub fn provider(mut self, provider: ProviderDescriptor) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = ProviderDescriptor>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Transport used for every call; reqwest when unset
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing tracker; `policy` and `clock` are then ignored
    pub fn tracker(mut self, tracker: Arc<QuotaTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn policy(mut self, policy: CooldownPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Characters of a failing body kept on an attempt
    pub fn payload_budget(mut self, budget: usize) -> Self {
        self.payload_budget = budget;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Upper bound applied to every task's deadline
    pub fn max_deadline(mut self, max_deadline: Duration) -> Self {
        self.max_deadline = max_deadline;
        self
    }

    pub fn build(self) -> Result<Orchestrator, EngineError> {
        let mut ids = HashSet::new();
        for provider in &self.providers {
            if !ids.insert(provider.id.as_str()) {
                return Err(EngineError::DuplicateProvider(provider.id.clone()));
            }
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpClient::new()?),
        };
        let tracker = self.tracker.unwrap_or_else(|| {
            let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
            Arc::new(QuotaTracker::with_clock(self.policy, clock))
        });
        for provider in &self.providers {
            tracker.register(&provider.id, provider.credential_slots());
        }

        info!(providers = self.providers.len(), "orchestrator ready");

        Ok(Orchestrator {
            providers: self.providers.into_iter().map(Arc::new).collect(),
            tracker,
            client: TransportClient::new(transport).with_payload_budget(self.payload_budget),
            normalizer: self.normalizer.with_payload_budget(self.payload_budget),
            max_results: self.max_results,
            max_deadline: self.max_deadline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ProviderRequest, RawResponse};
    use crate::providers::ProviderKind;
    use async_trait::async_trait;

    struct Unused;

    #[async_trait]
    impl Transport for Unused {
        async fn send(&self, _request: ProviderRequest) -> Result<RawResponse, TransportFailure> {
            Err(TransportFailure::Network("unused".to_string()))
        }
    }

    #[test]
    fn test_candidates_order() {
        let orchestrator = Orchestrator::builder()
            .transport(Arc::new(Unused))
            .provider(ProviderDescriptor::new("groq", ProviderKind::Groq).with_priority(3))
            .provider(ProviderDescriptor::new("gemini", ProviderKind::Gemini).with_priority(1))
            .provider(ProviderDescriptor::new("cohere", ProviderKind::Cohere).with_priority(3))
            .provider(ProviderDescriptor::new("remotive", ProviderKind::Remotive).with_priority(1))
            .build()
            .unwrap();

        let ids: Vec<_> = orchestrator
            .candidates(TaskType::GenerateAnswer)
            .iter()
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(ids, vec!["gemini", "groq", "cohere"]);
        assert_eq!(orchestrator.candidates(TaskType::SearchJobs).len(), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Orchestrator::builder()
            .transport(Arc::new(Unused))
            .provider(ProviderDescriptor::new("gemini", ProviderKind::Gemini))
            .provider(ProviderDescriptor::new("gemini", ProviderKind::Gemini))
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateProvider(id) if id == "gemini"));
    }

    #[tokio::test]
    async fn test_no_provider_configured() {
        let orchestrator = Orchestrator::builder()
            .transport(Arc::new(Unused))
            .provider(ProviderDescriptor::new("remotive", ProviderKind::Remotive))
            .build()
            .unwrap();
        let task = crate::prompts::cover_letter("resume", "job description", "professional");
        let result = orchestrator.orchestrate(&task).await;

        assert_eq!(result.status, OrchestrationStatus::Failure);
        assert_eq!(result.failure_reason, Some(FailureReason::NoProviderConfigured));
        assert!(result.attempts.is_empty());
        assert!(result.data.is_none());
    }

    #[tokio::test]
    async fn test_deadline_ceiling() {
        let orchestrator = Orchestrator::builder()
            .transport(Arc::new(Unused))
            .max_deadline(Duration::ZERO)
            .provider(ProviderDescriptor::new("remotive", ProviderKind::Remotive))
            .build()
            .unwrap();
        let task = crate::prompts::job_search(crate::protocol::JobQuery::new("rust"));
        let result = orchestrator.orchestrate(&task).await;
        assert_eq!(result.failure_reason, Some(FailureReason::DeadlineExceeded));
    }
}
