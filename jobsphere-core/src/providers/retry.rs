//! Cooldown and retry policy
//!
//! A credential that keeps failing is benched for an exponentially growing
//! cooldown, and transient failures earn a bounded number of same-provider
//! re-attempts.

use crate::config::CircuitConfig;
use crate::protocol::AttemptOutcome;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a failing credential is benched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownPolicy {
    /// Consecutive non-success outcomes that trip the cooldown
    pub failure_threshold: u32,

    /// Cooldown after the first trip
    pub base_cooldown: Duration,

    /// Upper bound for the doubled cooldowns
    pub max_cooldown: Duration,

    /// Jitter factor (0.0 to 1.0) to spread simultaneous recoveries
    pub jitter_factor: f64,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            base_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(30 * 60),
            jitter_factor: 0.0,
        }
    }
}

impl From<&CircuitConfig> for CooldownPolicy {
    fn from(config: &CircuitConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            base_cooldown: Duration::from_millis(config.base_cooldown_ms),
            max_cooldown: Duration::from_millis(config.max_cooldown_ms),
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
        }
    }
}

impl CooldownPolicy {
    /// Cooldown for the given trip (1-based): `base * 2^(trip-1)`, capped
    pub fn backoff(&self, trip: u32) -> Duration {
        let exponent = trip.saturating_sub(1).min(31);
        let base_ms = self.base_cooldown.as_millis() as f64;
        let cap_ms = self.max_cooldown.as_millis() as f64;
        let capped = (base_ms * 2f64.powi(exponent as i32)).min(cap_ms);

        let with_jitter = if self.jitter_factor > 0.0 {
            let mut rng = rand::thread_rng();
            let spread = capped * self.jitter_factor;
            (capped + rng.gen_range(0.0..=spread)).min(cap_ms)
        } else {
            capped
        };

        Duration::from_millis(with_jitter as u64)
    }

    /// Cooldown for a trip, preferring a provider-declared retry hint.
    ///
    /// The hint is still capped so a hostile header cannot bench a
    /// credential for longer than the configured maximum.
    pub fn cooldown(&self, trip: u32, retry_hint: Option<Duration>) -> Duration {
        match retry_hint {
            Some(hint) if !hint.is_zero() => hint.min(self.max_cooldown),
            _ => self.backoff(trip),
        }
    }
}

/// Whether another attempt against the same provider is allowed
pub fn should_retry(outcome: AttemptOutcome, retries_used: u32, max_retries: u32) -> bool {
    outcome.is_transient() && retries_used < max_retries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_doubles_per_trip() {
        let policy = CooldownPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(30));
        assert_eq!(policy.backoff(2), Duration::from_secs(60));
        assert_eq!(policy.backoff(3), Duration::from_secs(120));
        assert_eq!(policy.backoff(7), Duration::from_secs(1800));
        assert_eq!(policy.backoff(40), Duration::from_secs(1800));
    }

    #[test]
    fn test_retry_hint_preferred_but_capped() {
        let policy = CooldownPolicy::default();
        assert_eq!(
            policy.cooldown(1, Some(Duration::from_secs(17))),
            Duration::from_secs(17)
        );
        assert_eq!(
            policy.cooldown(1, Some(Duration::from_secs(86_400))),
            Duration::from_secs(1800)
        );
        assert_eq!(policy.cooldown(2, None), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = CooldownPolicy {
            jitter_factor: 0.5,
            ..CooldownPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.backoff(1);
            assert!(delay >= Duration::from_secs(30));
            assert!(delay <= Duration::from_secs(45));
        }
    }

    #[test]
    fn test_only_transient_outcomes_retry() {
        assert!(should_retry(AttemptOutcome::RateLimited, 0, 1));
        assert!(should_retry(AttemptOutcome::TransportError, 0, 1));
        assert!(should_retry(AttemptOutcome::Timeout, 0, 1));
        assert!(!should_retry(AttemptOutcome::RateLimited, 1, 1));
        assert!(!should_retry(AttemptOutcome::AuthError, 0, 1));
        assert!(!should_retry(AttemptOutcome::MalformedResponse, 0, 5));
    }

    #[test]
    fn test_from_circuit_config() {
        let config = CircuitConfig {
            failure_threshold: 5,
            base_cooldown_ms: 1_000,
            max_cooldown_ms: 4_000,
            jitter_factor: 0.0,
        };
        let policy = CooldownPolicy::from(&config);
        assert_eq!(policy.failure_threshold, 5);
        assert_eq!(policy.backoff(5), Duration::from_secs(4));
    }
}
