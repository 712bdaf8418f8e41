//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::protocol::TaskType;
use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Currently supported configuration schema version
pub const SCHEMA_VERSION: &str = "0.1";

/// Root configuration structure for the orchestration engine
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// External backends, in declaration order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Cooldown behaviour of the quota tracker
    #[serde(default)]
    pub circuit: CircuitConfig,

    /// Global connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Defaults applied to task descriptors
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            providers: Vec::new(),
            circuit: CircuitConfig::default(),
            connection: ConnectionConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

/// One external backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique provider id, reported in `served_by` and attempt records
    pub id: String,

    /// Which wire protocol the provider speaks
    pub kind: ProviderKind,

    /// Endpoint override; the kind's public endpoint is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Model override for AI providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Credentials rotated round-robin (supports environment variable interpolation)
    #[serde(default)]
    pub credentials: Vec<SecretString>,

    /// Task types served; empty means every task the kind supports
    #[serde(default)]
    pub tasks: Vec<TaskType>,

    /// Priority for all tasks (lower = tried first)
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Per-task priority overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_priority: BTreeMap<TaskType, i32>,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_ms: u64,

    /// Same-provider re-attempts on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether this provider is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderConfig {
    /// A provider entry with default settings
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            endpoint: None,
            model: None,
            credentials: Vec::new(),
            tasks: Vec::new(),
            priority: default_priority(),
            task_priority: BTreeMap::new(),
            timeout_ms: default_provider_timeout(),
            max_retries: default_max_retries(),
            enabled: true,
        }
    }
}

/// Quota tracker cooldown settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitConfig {
    /// Consecutive non-success outcomes before a credential cools down
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown for the first trip in milliseconds
    #[serde(default = "default_base_cooldown")]
    pub base_cooldown_ms: u64,

    /// Upper bound for the exponentially growing cooldown
    #[serde(default = "default_max_cooldown")]
    pub max_cooldown_ms: u64,

    /// Random spread added to cooldowns (0.0 - 1.0)
    #[serde(default)]
    pub jitter_factor: f64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_cooldown_ms: default_base_cooldown(),
            max_cooldown_ms: default_max_cooldown(),
            jitter_factor: 0.0,
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,

    /// Keep-alive timeout in seconds
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    /// Response bodies above this size are rejected
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            max_idle_per_host: default_max_idle(),
            keepalive_secs: default_keepalive(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// Default values for task descriptors built by the prompt helpers
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Ceiling on any run's deadline in milliseconds
    #[serde(default = "default_deadline")]
    pub deadline_ms: u64,

    /// Maximum number of merged job items
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline(),
            max_results: default_max_results(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_priority() -> i32 { 100 }
fn default_provider_timeout() -> u64 { 30000 }
fn default_max_retries() -> u32 { 1 }
fn default_failure_threshold() -> u32 { 3 }
fn default_base_cooldown() -> u64 { 30_000 }
fn default_max_cooldown() -> u64 { 1_800_000 }
fn default_connect_timeout() -> u64 { 10000 }
fn default_max_idle() -> usize { 10 }
fn default_keepalive() -> u64 { 90 }
fn default_max_response_bytes() -> usize { 10 * 1024 * 1024 }
fn default_deadline() -> u64 { 60000 }
fn default_max_results() -> usize { 50 }

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != SCHEMA_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        let mut seen_ids = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen_ids.insert(&provider.id) {
                return Err(ValidationError::new(
                    format!("providers[{}].id", i),
                    ValidationErrorKind::DuplicateValue {
                        value: provider.id.clone(),
                    },
                ));
            }

            provider.validate(&format!("providers[{}]", i))?;
        }

        self.circuit.validate("circuit")?;
        self.connection.validate("connection")?;
        self.defaults.validate("defaults")?;

        Ok(())
    }
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::required(format!("{}.id", path)));
        }

        if let Some(endpoint) = &self.endpoint {
            match url::Url::parse(endpoint) {
                Ok(url) => {
                    if url.scheme() != "http" && url.scheme() != "https" {
                        return Err(ValidationError::invalid_url(
                            format!("{}.endpoint", path),
                            format!("URL scheme must be http or https, got: {}", url.scheme()),
                        ));
                    }
                }
                Err(e) => {
                    return Err(ValidationError::invalid_url(
                        format!("{}.endpoint", path),
                        e.to_string(),
                    ));
                }
            }
        }

        if self.enabled && self.kind.requires_credential() && self.credentials.is_empty() {
            return Err(ValidationError::required(format!("{}.credentials", path))
                .with_context(format!("{} requires at least one credential", self.kind)));
        }

        for (i, credential) in self.credentials.iter().enumerate() {
            let credential_path = format!("{}.credentials[{}]", path, i);
            if credential.is_empty() {
                return Err(ValidationError::required(credential_path));
            }
            if self.kind == ProviderKind::Adzuna && !credential.expose_secret().contains(':') {
                return Err(ValidationError::incompatible(
                    credential_path,
                    "Adzuna credentials take the form app_id:app_key",
                ));
            }
        }

        for (i, task) in self.tasks.iter().enumerate() {
            if !self.kind.supports(*task) {
                return Err(ValidationError::incompatible(
                    format!("{}.tasks[{}]", path, i),
                    format!("{} cannot serve {}", self.kind, task),
                ));
            }
        }

        for task in self.task_priority.keys() {
            let served = if self.tasks.is_empty() {
                self.kind.supports(*task)
            } else {
                self.tasks.contains(task)
            };
            if !served {
                return Err(ValidationError::incompatible(
                    format!("{}.task_priority.{}", path, task),
                    "priority given for a task the provider does not serve",
                ));
            }
        }

        if self.timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl CircuitConfig {
    /// Validate cooldown settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.failure_threshold == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.failure_threshold", path),
                "Must be at least 1",
            ));
        }

        if self.base_cooldown_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.base_cooldown_ms", path),
                "Must be greater than 0",
            ));
        }

        if self.max_cooldown_ms < self.base_cooldown_ms {
            return Err(ValidationError::incompatible(
                format!("{}.max_cooldown_ms", path),
                "Must be >= base_cooldown_ms",
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ValidationError::out_of_range(
                format!("{}.jitter_factor", path),
                "Must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }
}

impl ConnectionConfig {
    /// Validate connection settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        if self.max_response_bytes == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.max_response_bytes", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl DefaultsConfig {
    /// Validate task defaults
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.deadline_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.deadline_ms", path),
                "Must be greater than 0",
            ));
        }

        if self.max_results == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.max_results", path),
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> EngineConfig {
        let mut gemini = ProviderConfig::new("gemini", ProviderKind::Gemini);
        gemini.credentials = vec![SecretString::new("AIza-test-key-1")];
        EngineConfig {
            providers: vec![gemini, ProviderConfig::new("remotive", ProviderKind::Remotive)],
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_duplicate_provider_id() {
        let mut config = minimal();
        config.providers[1].id = "gemini".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "providers[1].id");
        assert!(matches!(err.kind, ValidationErrorKind::DuplicateValue { .. }));
    }

    #[test]
    fn test_missing_credentials_for_keyed_provider() {
        let mut config = minimal();
        config.providers[0].credentials.clear();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "providers[0].credentials");
    }

    #[test]
    fn test_disabled_provider_may_omit_credentials() {
        let mut config = minimal();
        config.providers[0].credentials.clear();
        config.providers[0].enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_job_board_cannot_generate_text() {
        let mut config = minimal();
        config.providers[1].tasks = vec![TaskType::GenerateCoverLetter];
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "providers[1].tasks[0]");
    }

    #[test]
    fn test_adzuna_credential_format() {
        let mut adzuna = ProviderConfig::new("adzuna", ProviderKind::Adzuna);
        adzuna.credentials = vec![SecretString::new("only-an-id")];
        let config = EngineConfig {
            providers: vec![adzuna],
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "providers[0].credentials[0]");
    }

    #[test]
    fn test_cooldown_bounds() {
        let mut config = minimal();
        config.circuit.max_cooldown_ms = 10;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field_path, "circuit.max_cooldown_ms");
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut config = minimal();
        config.providers[0].endpoint = Some("ftp://example.com".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
    }
}
