//! Sequential fallback across providers in priority order

use super::{Orchestrator, Run};
use crate::protocol::{FailureReason, OrchestrationResult, TaskDescriptor};
use crate::providers::should_retry;
use tracing::{debug, info};

impl Orchestrator {
    /// Try eligible providers one at a time until one answer normalizes.
    ///
    /// The deadline is checked before every attempt and caps each call's
    /// timeout. A transient failure earns one more call to the same provider
    /// with its next usable credential, up to `max_retries`.
    pub(super) async fn run_cascade(
        &self,
        task: &TaskDescriptor,
        mut run: Run,
    ) -> OrchestrationResult {
        let candidates = self.candidates(task.task_type);
        if candidates.is_empty() {
            return run.fail(FailureReason::NoProviderConfigured);
        }

        let mut attempted = false;

        for provider in candidates {
            let mut retries_used = 0;

            loop {
                let Some(remaining) = run.remaining() else {
                    return run.fail(FailureReason::DeadlineExceeded);
                };
                let Some(credential) = self.tracker.next_credential(&provider.id) else {
                    debug!(provider = %provider.id, "every credential is cooling down, skipping");
                    break;
                };
                attempted = true;

                let deadline_capped = remaining < provider.timeout;
                let timeout = remaining.min(provider.timeout);
                let call = self.client.call(&provider, credential, task, timeout).await;
                let (attempt, data) = self.settle(&provider, call, &task.expected_schema);
                self.record(&attempt, deadline_capped);

                let outcome = attempt.outcome;
                run.attempts.push(attempt);

                if let Some(data) = data {
                    info!(provider = %provider.id, credential, "served");
                    return run.succeed(data, vec![provider.id.clone()]);
                }

                debug!(provider = %provider.id, credential, outcome = %outcome, "attempt failed");
                if !should_retry(outcome, retries_used, provider.max_retries) {
                    break;
                }
                retries_used += 1;
            }
        }

        if !attempted {
            run.fail(FailureReason::NoEligibleProvider)
        } else if run.remaining().is_none() {
            run.fail(FailureReason::DeadlineExceeded)
        } else {
            run.fail(FailureReason::Exhausted)
        }
    }
}
