//! Concurrent queries across every eligible provider

use super::merge::{ResultMerger, SourceList};
use super::{Orchestrator, Run};
use crate::protocol::{
    Attempt, AttemptOutcome, FailureReason, JobItem, OrchestrationResult, TaskDescriptor,
};
use crate::providers::ProviderDescriptor;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// A call that has been spawned and not yet collected
struct Dispatched {
    provider: Arc<ProviderDescriptor>,
    credential: usize,
    started_at: DateTime<Utc>,
    started: Instant,
    deadline_capped: bool,
}

impl Orchestrator {
    /// Query all eligible providers at once and keep what arrives in time.
    ///
    /// Each call is bounded by its own timeout and by the run deadline. When
    /// the deadline passes, calls still in flight are aborted and logged as
    /// timeouts without touching their provider's health.
    pub(super) async fn run_fanout(
        &self,
        task: &TaskDescriptor,
        mut run: Run,
    ) -> OrchestrationResult {
        let candidates = self.candidates(task.task_type);
        if candidates.is_empty() {
            return run.fail(FailureReason::NoProviderConfigured);
        }
        let Some(remaining) = run.remaining() else {
            return run.fail(FailureReason::DeadlineExceeded);
        };

        let shared_task = Arc::new(task.clone());
        let mut calls = JoinSet::new();
        // indexed by dispatch order, which is priority order
        let mut pending: Vec<Option<Dispatched>> = Vec::new();

        for provider in candidates {
            let Some(credential) = self.tracker.next_credential(&provider.id) else {
                debug!(provider = %provider.id, "every credential is cooling down, skipping");
                continue;
            };

            let slot = pending.len();
            let timeout = remaining.min(provider.timeout);
            pending.push(Some(Dispatched {
                provider: Arc::clone(&provider),
                credential,
                started_at: Utc::now(),
                started: Instant::now(),
                deadline_capped: remaining < provider.timeout,
            }));

            let client = self.client.clone();
            let task = Arc::clone(&shared_task);
            calls.spawn(async move {
                let call = client.call(&provider, credential, &task, timeout).await;
                (slot, call)
            });
        }

        if pending.is_empty() {
            return run.fail(FailureReason::NoEligibleProvider);
        }

        let mut contributions: Vec<(usize, Arc<ProviderDescriptor>, Value)> = Vec::new();
        let mut deadline_hit = false;

        loop {
            match tokio::time::timeout_at(run.deadline, calls.join_next()).await {
                Ok(Some(Ok((slot, call)))) => {
                    let Some(dispatched) = pending.get_mut(slot).and_then(Option::take) else {
                        continue;
                    };
                    let (attempt, data) =
                        self.settle(&dispatched.provider, call, &task.expected_schema);
                    self.record(&attempt, dispatched.deadline_capped);
                    run.attempts.push(attempt);
                    if let Some(data) = data {
                        contributions.push((slot, dispatched.provider, data));
                    }
                }
                Ok(Some(Err(err))) => error!(error = %err, "provider call task failed"),
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    break;
                }
            }
        }
        calls.shutdown().await;

        for dispatched in pending.into_iter().flatten() {
            warn!(provider = %dispatched.provider.id, "call abandoned");
            run.attempts.push(abandoned(dispatched, deadline_hit));
        }
        run.attempts.sort_by_start();

        if contributions.is_empty() {
            let reason = if deadline_hit || run.remaining().is_none() {
                FailureReason::DeadlineExceeded
            } else {
                FailureReason::Exhausted
            };
            return run.fail(reason);
        }
        contributions.sort_by_key(|(slot, _, _)| *slot);

        if task.expected_schema.shape.is_job_list() {
            let max_results = task.max_results.unwrap_or(self.max_results);
            self.merge_jobs(run, task, contributions, max_results)
        } else {
            // highest-priority contributor wins
            let (_, provider, data) = contributions.swap_remove(0);
            run.succeed(data, vec![provider.id.clone()])
        }
    }

    fn merge_jobs(
        &self,
        run: Run,
        task: &TaskDescriptor,
        contributions: Vec<(usize, Arc<ProviderDescriptor>, Value)>,
        max_results: usize,
    ) -> OrchestrationResult {
        let mut served_by = Vec::with_capacity(contributions.len());
        let mut lists = Vec::with_capacity(contributions.len());

        for (_, provider, data) in contributions {
            match serde_json::from_value::<Vec<JobItem>>(data) {
                Ok(items) => {
                    served_by.push(provider.id.clone());
                    lists.push(SourceList::new(
                        provider.id.clone(),
                        provider.priority_for(task.task_type),
                        items,
                    ));
                }
                Err(err) => warn!(provider = %provider.id, error = %err, "job list dropped"),
            }
        }

        let merged = ResultMerger::new().with_max_results(max_results).merge(lists);
        match serde_json::to_value(&merged) {
            Ok(data) if !served_by.is_empty() => {
                debug!(items = merged.len(), sources = served_by.len(), "job lists merged");
                run.succeed(data, served_by)
            }
            Ok(_) => run.fail(FailureReason::Exhausted),
            Err(err) => {
                error!(error = %err, "merged job list is not serializable");
                run.fail(FailureReason::Exhausted)
            }
        }
    }
}

/// Attempt for a call collected neither before the deadline nor at all
fn abandoned(dispatched: Dispatched, deadline_hit: bool) -> Attempt {
    let mut attempt = Attempt::begin(dispatched.provider.id.clone(), dispatched.credential);
    attempt.started_at = dispatched.started_at;
    attempt.duration_ms = dispatched.started.elapsed().as_millis() as u64;
    if deadline_hit {
        attempt.outcome = AttemptOutcome::Timeout;
        attempt.detail = Some("abandoned at run deadline".to_string());
    } else {
        attempt.outcome = AttemptOutcome::TransportError;
        attempt.detail = Some("call task ended without a result".to_string());
    }
    attempt
}
