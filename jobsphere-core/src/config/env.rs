//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::Regex;
use std::env;

const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Interpolate `${VAR}` references in a configuration document
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    interpolate_with(content, |name| env::var(name).ok())
}

/// Interpolate using an arbitrary variable lookup.
///
/// Every reference must resolve; the first unresolved name is reported.
pub fn interpolate_with<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = Regex::new(ENV_VAR_PATTERN)?;
    let mut missing = None;

    let result = pattern.replace_all(content, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        match lookup(var_name) {
            Some(value) => value,
            None => {
                if missing.is_none() {
                    missing = Some(var_name.to_string());
                }
                String::new()
            }
        }
    });

    if let Some(var) = missing {
        return Err(ConfigError::EnvVarNotFound { var });
    }

    Ok(result.into_owned())
}
