//! Quota and circuit tracking per provider credential
//!
//! The tracker is the only owner of mutable provider state. Each
//! `(provider, credential)` pair gets its own lock, so concurrent updates for
//! different providers never contend while updates to the same credential are
//! serialized.

use super::retry::CooldownPolicy;
use crate::protocol::AttemptOutcome;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Source of the current instant
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + offset
    }
}

/// Health of one provider credential
#[derive(Debug, Clone, Default)]
pub struct ProviderHealth {
    pub consecutive_failures: u32,
    /// Cooldowns entered since the last success
    pub trips: u32,
    pub cooldown_until: Option<Instant>,
    pub last_used: Option<Instant>,
}

impl ProviderHealth {
    fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }
}

/// Request counters of one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Point-in-time view of one credential's health
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialHealth {
    pub provider_id: String,
    pub credential_index: usize,
    pub consecutive_failures: u32,
    pub trips: u32,
    /// Time left before the credential is eligible again
    pub cooldown_remaining_ms: Option<u64>,
}

#[derive(Debug)]
struct ProviderSlots {
    credentials: usize,
    cursor: AtomicUsize,
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl ProviderSlots {
    fn new(credentials: usize) -> Self {
        Self {
            credentials: credentials.max(1),
            cursor: AtomicUsize::new(0),
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }
}

type HealthKey = (String, usize);

/// Tracks consecutive failures, cooldowns and credential rotation
#[derive(Debug)]
pub struct QuotaTracker {
    policy: CooldownPolicy,
    clock: Arc<dyn Clock>,
    providers: RwLock<HashMap<String, Arc<ProviderSlots>>>,
    health: RwLock<HashMap<HealthKey, Arc<Mutex<ProviderHealth>>>>,
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(CooldownPolicy::default())
    }
}

impl QuotaTracker {
    /// Tracker on the wall clock
    pub fn new(policy: CooldownPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Tracker on an injected clock
    pub fn with_clock(policy: CooldownPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            providers: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    /// Declare how many credentials a provider rotates through.
    ///
    /// Providers that need no credential count as having one implicit slot.
    /// Unregistered providers behave the same way.
    pub fn register(&self, provider_id: &str, credentials: usize) {
        let mut providers = write(&self.providers);
        providers
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(ProviderSlots::new(credentials)));
    }

    /// Whether the credential is outside any cooldown
    pub fn is_eligible(&self, provider_id: &str, credential_index: usize) -> bool {
        let now = self.clock.now();
        match self.existing(provider_id, credential_index) {
            Some(record) => !lock(&record).in_cooldown(now),
            None => true,
        }
    }

    /// Next credential in round-robin order that is not cooling down
    pub fn next_credential(&self, provider_id: &str) -> Option<usize> {
        let slots = self.slots(provider_id);
        let start = slots.cursor.load(Ordering::Relaxed);

        for offset in 0..slots.credentials {
            let index = (start + offset) % slots.credentials;
            if self.is_eligible(provider_id, index) {
                slots
                    .cursor
                    .store((index + 1) % slots.credentials, Ordering::Relaxed);
                return Some(index);
            }
        }

        None
    }

    /// Whether any credential of the provider is usable
    pub fn has_eligible_credential(&self, provider_id: &str) -> bool {
        let slots = self.slots(provider_id);
        (0..slots.credentials).any(|index| self.is_eligible(provider_id, index))
    }

    /// Fold one attempt outcome into the credential's health.
    ///
    /// Success resets everything. Rate limiting trips the cooldown at once,
    /// honouring `retry_after` when the provider sent one. Other failures
    /// trip it once `failure_threshold` consecutive failures accumulate; the
    /// count is kept after a cooldown expires, so the next failure re-trips
    /// with a doubled cooldown.
    pub fn record_outcome(
        &self,
        provider_id: &str,
        credential_index: usize,
        outcome: AttemptOutcome,
        retry_after: Option<Duration>,
    ) {
        let now = self.clock.now();
        let slots = self.slots(provider_id);
        slots.requests.fetch_add(1, Ordering::Relaxed);

        let record = self.record(provider_id, credential_index);
        let mut health = lock(&record);
        health.last_used = Some(now);

        if outcome.is_success() {
            slots.successes.fetch_add(1, Ordering::Relaxed);
            if health.trips > 0 {
                info!(
                    provider = provider_id,
                    credential = credential_index,
                    "credential recovered"
                );
            }
            health.consecutive_failures = 0;
            health.trips = 0;
            health.cooldown_until = None;
            return;
        }

        slots.failures.fetch_add(1, Ordering::Relaxed);
        health.consecutive_failures += 1;

        let trip = outcome == AttemptOutcome::RateLimited
            || health.consecutive_failures >= self.policy.failure_threshold;
        if !trip {
            return;
        }

        health.trips += 1;
        let hint = if outcome == AttemptOutcome::RateLimited {
            retry_after
        } else {
            None
        };
        let cooldown = self.policy.cooldown(health.trips, hint);
        health.cooldown_until = Some(now + cooldown);

        warn!(
            provider = provider_id,
            credential = credential_index,
            outcome = %outcome,
            consecutive_failures = health.consecutive_failures,
            cooldown_ms = cooldown.as_millis() as u64,
            "credential entering cooldown"
        );
    }

    /// When the credential becomes eligible again, if it is cooling down
    pub fn cooldown_until(&self, provider_id: &str, credential_index: usize) -> Option<Instant> {
        let now = self.clock.now();
        self.existing(provider_id, credential_index)
            .and_then(|record| lock(&record).cooldown_until)
            .filter(|until| now < *until)
    }

    /// Copy of a credential's health record, if it has been used
    pub fn health(&self, provider_id: &str, credential_index: usize) -> Option<ProviderHealth> {
        self.existing(provider_id, credential_index)
            .map(|record| lock(&record).clone())
    }

    /// Request counters per provider
    pub fn usage_snapshot(&self) -> HashMap<String, UsageStats> {
        read(&self.providers)
            .iter()
            .map(|(id, slots)| {
                let stats = UsageStats {
                    requests: slots.requests.load(Ordering::Relaxed),
                    successes: slots.successes.load(Ordering::Relaxed),
                    failures: slots.failures.load(Ordering::Relaxed),
                };
                (id.clone(), stats)
            })
            .collect()
    }

    /// Health of every credential used so far, ordered by provider and index
    pub fn health_snapshot(&self) -> Vec<CredentialHealth> {
        let now = self.clock.now();
        let mut snapshot: Vec<CredentialHealth> = read(&self.health)
            .iter()
            .map(|((provider_id, credential_index), record)| {
                let health = lock(record);
                CredentialHealth {
                    provider_id: provider_id.clone(),
                    credential_index: *credential_index,
                    consecutive_failures: health.consecutive_failures,
                    trips: health.trips,
                    cooldown_remaining_ms: health
                        .cooldown_until
                        .filter(|until| now < *until)
                        .map(|until| (until - now).as_millis() as u64),
                }
            })
            .collect();
        snapshot.sort_by(|a, b| {
            (a.provider_id.as_str(), a.credential_index)
                .cmp(&(b.provider_id.as_str(), b.credential_index))
        });
        snapshot
    }

    fn slots(&self, provider_id: &str) -> Arc<ProviderSlots> {
        if let Some(slots) = read(&self.providers).get(provider_id) {
            return Arc::clone(slots);
        }
        let mut providers = write(&self.providers);
        Arc::clone(
            providers
                .entry(provider_id.to_string())
                .or_insert_with(|| Arc::new(ProviderSlots::new(1))),
        )
    }

    fn existing(
        &self,
        provider_id: &str,
        credential_index: usize,
    ) -> Option<Arc<Mutex<ProviderHealth>>> {
        read(&self.health)
            .get(&(provider_id.to_string(), credential_index))
            .cloned()
    }

    fn record(&self, provider_id: &str, credential_index: usize) -> Arc<Mutex<ProviderHealth>> {
        if let Some(record) = self.existing(provider_id, credential_index) {
            return record;
        }
        let mut health = write(&self.health);
        Arc::clone(
            health
                .entry((provider_id.to_string(), credential_index))
                .or_default(),
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
