//! Configuration validation utilities

use super::error::{ValidationError, ValidationErrorKind};
use super::schema::EngineConfig;
use super::secrets::is_sensitive_name;
use crate::protocol::TaskType;
use tracing::warn;

/// Configuration validator with rules that span several sections
#[derive(Debug, Default)]
pub struct ConfigValidator {
    allow_empty: bool,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept configurations without any enabled provider.
    ///
    /// Such an engine answers every task with `NoProviderConfigured`, which
    /// is occasionally what a test harness wants.
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &EngineConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_enabled(config)?;
        self.validate_placeholders(config)?;

        for task in self.uncovered_tasks(config) {
            warn!(task = %task, "no enabled provider serves this task type");
        }

        Ok(())
    }

    fn validate_enabled(&self, config: &EngineConfig) -> Result<(), ValidationError> {
        if self.allow_empty {
            return Ok(());
        }

        if !config.providers.iter().any(|p| p.enabled) {
            return Err(ValidationError::required("providers")
                .with_context("At least one provider must be enabled"));
        }

        Ok(())
    }

    /// Credentials must not carry unresolved `${VAR}` references
    fn validate_placeholders(&self, config: &EngineConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            for (j, credential) in provider.credentials.iter().enumerate() {
                if credential.expose_secret().contains("${") {
                    return Err(ValidationError::new(
                        format!("providers[{}].credentials[{}]", i, j),
                        ValidationErrorKind::Incompatible {
                            message: "unresolved environment reference".to_string(),
                        },
                    ));
                }
            }
        }

        Ok(())
    }

    /// Task types no enabled provider can serve
    pub fn uncovered_tasks(&self, config: &EngineConfig) -> Vec<TaskType> {
        TaskType::ALL
            .iter()
            .copied()
            .filter(|task| {
                !config.providers.iter().any(|p| {
                    p.enabled
                        && if p.tasks.is_empty() {
                            p.kind.supports(*task)
                        } else {
                            p.tasks.contains(task)
                        }
                })
            })
            .collect()
    }

    /// Check if a field name appears to contain sensitive information
    pub fn is_sensitive_field(&self, field_name: &str) -> bool {
        is_sensitive_name(field_name)
    }
}
