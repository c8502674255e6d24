//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{join_errors, validate_config, ValidationError};

pub const ENV_PORT: &str = "PORT";
pub const ENV_DEPENDENCY_URI: &str = "DEPENDENCY_URI";
/// Accepted in place of `DEPENDENCY_URI`.
pub const ENV_MONGO_URI: &str = "MONGO_URI";
pub const ENV_MAX_RETRIES: &str = "GATE_MAX_RETRIES";
pub const ENV_RETRY_BACKOFF_MS: &str = "GATE_RETRY_BACKOFF_MS";
pub const ENV_BACKOFF_CEILING_MS: &str = "GATE_BACKOFF_CEILING_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "GATE_CONNECT_TIMEOUT_MS";
pub const ENV_DRAIN_GRACE_SECS: &str = "GATE_DRAIN_GRACE_SECS";
pub const ENV_BIND_HOST: &str = "GATE_BIND_HOST";
pub const ENV_METRICS_ADDRESS: &str = "GATE_METRICS_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("dependency URI not set (expected DEPENDENCY_URI or MONGO_URI)")]
    MissingDependencyUri,

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// Load configuration from an optional TOML file, overlaid with the
/// process environment, and validate it.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injectable variable lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => ServiceConfig::default(),
    };

    apply_env(&mut config, &lookup);

    if config.dependency_uri.trim().is_empty() {
        return Err(ConfigError::MissingDependencyUri);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn read_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Overlay environment variables. Unusable values are ignored with a warning
/// so that a typo in a tuning knob never prevents startup.
fn apply_env<F>(config: &mut ServiceConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_PORT) {
        match raw.trim().parse::<u16>() {
            Ok(port) if port != 0 => config.port = port,
            _ => {
                tracing::warn!(value = %raw, kept = config.port, "Ignoring invalid PORT");
            }
        }
    }

    if let Some(uri) = lookup(ENV_DEPENDENCY_URI).or_else(|| lookup(ENV_MONGO_URI)) {
        config.dependency_uri = uri.trim().to_string();
    }

    override_parsed(lookup, ENV_MAX_RETRIES, &mut config.max_retries);
    override_parsed(lookup, ENV_RETRY_BACKOFF_MS, &mut config.retry_backoff_ms);
    override_parsed(lookup, ENV_BACKOFF_CEILING_MS, &mut config.backoff_ceiling_ms);
    override_parsed(lookup, ENV_CONNECT_TIMEOUT_MS, &mut config.connect_timeout_ms);
    override_parsed(lookup, ENV_DRAIN_GRACE_SECS, &mut config.drain_grace_secs);
    override_parsed(lookup, ENV_BIND_HOST, &mut config.bind_host);

    if let Some(raw) = lookup(ENV_METRICS_ADDRESS) {
        match raw.trim().parse() {
            Ok(addr) => config.metrics_address = Some(addr),
            Err(_) => tracing::warn!(key = ENV_METRICS_ADDRESS, value = %raw, "Ignoring unparseable value"),
        }
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };

    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable value"),
    }
}
