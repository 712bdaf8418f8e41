//! Provider adapters and health tracking
//!
//! A [`ProviderDescriptor`] describes one configured backend; its
//! [`ProviderKind`] knows the wire format. The [`QuotaTracker`] keeps the
//! per-credential failure counts and cooldowns that decide eligibility.

pub mod adapter;
pub mod error;
pub mod health;
mod jobs;
pub mod retry;
mod text;

pub use adapter::{ProviderDescriptor, ProviderKind, DEFAULT_PRIORITY, DEFAULT_TIMEOUT};
pub use error::{ProviderError, ProviderResult};
pub use health::{
    Clock, CredentialHealth, ManualClock, ProviderHealth, QuotaTracker, SystemClock, UsageStats,
};
pub use jobs::DEFAULT_COUNTRY;
pub use retry::{should_retry, CooldownPolicy};
