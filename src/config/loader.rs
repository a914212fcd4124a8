//! Configuration loading from disk and environment.
//!
//! Precedence: defaults < TOML file < environment variables.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::CacheConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_REMOTE_STORE_URL: &str = "REMOTE_STORE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";
pub const ENV_SOCKET_TIMEOUT_SECONDS: &str = "SOCKET_TIMEOUT_SECONDS";
pub const ENV_CIRCUIT_FAILURE_THRESHOLD: &str = "CIRCUIT_FAILURE_THRESHOLD";
pub const ENV_CIRCUIT_RECOVERY_TIMEOUT_SECONDS: &str = "CIRCUIT_RECOVERY_TIMEOUT_SECONDS";
pub const ENV_CIRCUIT_MAX_RECOVERY_TIMEOUT_SECONDS: &str = "CIRCUIT_MAX_RECOVERY_TIMEOUT_SECONDS";
pub const ENV_FALLBACK_MAX_SIZE: &str = "FALLBACK_MAX_SIZE";
pub const ENV_FALLBACK_TTL_SECONDS: &str = "FALLBACK_TTL_SECONDS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { key: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { key, value } => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML file, overlay the process environment and validate.
pub fn load_config(path: &Path) -> Result<CacheConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: CacheConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults and the process environment only.
pub fn load_from_env() -> Result<CacheConfig, ConfigError> {
    let mut config = CacheConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the recognized env-style keys using `lookup` as the variable source.
pub fn apply_env_overrides<F>(config: &mut CacheConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_REMOTE_STORE_URL) {
        config.remote.url = url;
    }
    if let Some(v) = parse_env(&lookup, ENV_MAX_CONNECTIONS)? {
        config.pool.max_connections = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_SOCKET_TIMEOUT_SECONDS)? {
        config.pool.socket_timeout_secs = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_CIRCUIT_FAILURE_THRESHOLD)? {
        config.circuit_breaker.failure_threshold = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_CIRCUIT_RECOVERY_TIMEOUT_SECONDS)? {
        config.circuit_breaker.recovery_timeout_secs = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_CIRCUIT_MAX_RECOVERY_TIMEOUT_SECONDS)? {
        config.circuit_breaker.max_recovery_timeout_secs = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_FALLBACK_MAX_SIZE)? {
        config.fallback.max_size = v;
    }
    if let Some(v) = parse_env(&lookup, ENV_FALLBACK_TTL_SECONDS)? {
        config.fallback.ttl_secs = v;
    }
    Ok(())
}

fn parse_env<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CacheConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("REMOTE_STORE_URL", "redis://cache.internal:6380/2"),
                ("MAX_CONNECTIONS", "8"),
                ("CIRCUIT_FAILURE_THRESHOLD", "3"),
                ("FALLBACK_TTL_SECONDS", " 30 "),
            ]),
        )
        .unwrap();

        assert_eq!(config.remote.url, "redis://cache.internal:6380/2");
        assert_eq!(config.pool.max_connections, 8);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.fallback.ttl_secs, 30);
        // untouched keys keep defaults
        assert_eq!(config.fallback.max_size, 1000);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = CacheConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("MAX_CONNECTIONS", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn test_load_config_file() {
        let path = std::env::temp_dir().join(format!("resilient-cache-{}.toml", std::process::id()));
        fs::write(
            &path,
            "[pool]\nmax_connections = 4\n\n[circuit_breaker]\nrecovery_timeout_secs = 10\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.circuit_breaker.recovery_timeout_secs, 10);

        fs::remove_file(&path).unwrap_or_default();
    }
}
