//! Engine configuration
//!
//! Provider descriptors, cooldown settings and connection limits are read once
//! at process start, either from a YAML/JSON document (with `${VAR}`
//! interpolation) or from the conventional environment variables.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::interpolate_with;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    CircuitConfig, ConnectionConfig, DefaultsConfig, EngineConfig, ProviderConfig, SCHEMA_VERSION,
};
pub use secrets::{
    is_sensitive_name, redact_by_field_name, redact_payload, truncate_chars, SecretString,
    DEFAULT_PAYLOAD_BUDGET, REDACTED,
};
pub use validator::ConfigValidator;

use crate::protocol::TaskType;
use crate::providers::ProviderKind;
use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<EngineConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_yaml(&content, &path.to_string_lossy())
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<EngineConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    let interpolated = env::interpolate_env_vars(&content)?;

    let config: EngineConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Parse and validate a YAML document already in memory
pub fn parse_yaml(content: &str, origin: &str) -> ConfigResult<EngineConfig> {
    let interpolated = env::interpolate_env_vars(content)?;

    let config: EngineConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

/// Build a configuration from the process environment
pub fn from_env() -> EngineConfig {
    from_lookup(|name| std::env::var(name).ok())
}

/// Build a configuration from an arbitrary variable lookup.
///
/// AI providers are enabled only when their key is present. Gemini keys are
/// collected from `GEMINI_API_KEY`, `GEMINI_API_KEY_2`, `GEMINI_API_KEY_3`, ...
/// until the first gap, and rotated round-robin. Job boards without keys
/// (Remotive, The Muse, Arbeitnow) are always enabled.
pub fn from_lookup<F>(lookup: F) -> EngineConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
    let mut providers = Vec::new();

    let mut gemini_keys: Vec<SecretString> =
        get("GEMINI_API_KEY").into_iter().map(Into::into).collect();
    for n in 2.. {
        match get(&format!("GEMINI_API_KEY_{}", n)) {
            Some(key) => gemini_keys.push(key.into()),
            None => break,
        }
    }

    let keyed: [(&str, ProviderKind, Vec<SecretString>, Option<String>); 7] = [
        ("gemini", ProviderKind::Gemini, gemini_keys, get("GEMINI_MODEL")),
        (
            "openrouter",
            ProviderKind::OpenRouter,
            get("OPENROUTER_API_KEY").into_iter().map(Into::into).collect(),
            get("OPENROUTER_MODEL"),
        ),
        (
            "groq",
            ProviderKind::Groq,
            get("GROQ_API_KEY").into_iter().map(Into::into).collect(),
            get("GROQ_MODEL"),
        ),
        (
            "cohere",
            ProviderKind::Cohere,
            get("COHERE_API_KEY").into_iter().map(Into::into).collect(),
            None,
        ),
        (
            "huggingface",
            ProviderKind::HuggingFace,
            get("HUGGINGFACE_API_KEY").into_iter().map(Into::into).collect(),
            None,
        ),
        (
            "openai",
            ProviderKind::OpenAi,
            get("OPENAI_API_KEY").into_iter().map(Into::into).collect(),
            None,
        ),
        (
            "xai",
            ProviderKind::Xai,
            get("XAI_API_KEY").into_iter().map(Into::into).collect(),
            None,
        ),
    ];

    for (priority, (id, kind, credentials, model)) in keyed.into_iter().enumerate() {
        if credentials.is_empty() {
            continue;
        }
        let mut provider = ProviderConfig::new(id, kind);
        provider.credentials = credentials;
        provider.model = model;
        provider.priority = priority as i32 + 1;
        providers.push(provider);
    }

    let adzuna = get("ADZUNA_APP_ID")
        .zip(get("ADZUNA_APP_KEY"))
        .map(|(id, key)| SecretString::new(format!("{}:{}", id, key)));
    let jsearch = get("JSEARCH_API_KEY").or_else(|| get("RAPIDAPI_KEY"));

    let boards: [(&str, ProviderKind, Option<SecretString>); 5] = [
        ("adzuna", ProviderKind::Adzuna, adzuna),
        ("remotive", ProviderKind::Remotive, None),
        ("themuse", ProviderKind::TheMuse, None),
        ("jsearch", ProviderKind::JSearch, jsearch.map(SecretString::new)),
        ("arbeitnow", ProviderKind::Arbeitnow, None),
    ];

    for (priority, (id, kind, credential)) in boards.into_iter().enumerate() {
        if kind.requires_credential() && credential.is_none() {
            continue;
        }
        let mut provider = ProviderConfig::new(id, kind);
        provider.credentials = credential.into_iter().collect();
        provider.tasks = vec![TaskType::SearchJobs];
        provider.priority = priority as i32 + 1;
        provider.timeout_ms = 10_000;
        providers.push(provider);
    }

    EngineConfig {
        providers,
        ..EngineConfig::default()
    }
}
