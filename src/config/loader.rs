//! Configuration loading from disk and the pod environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::PairConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PairConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: PairConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `path` when given, otherwise start from defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<PairConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = PairConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Fill unset identity fields from the pod environment.
///
/// `K8S_NAMESPACE` always wins over the file so one config can serve
/// several namespaces.
pub fn apply_env_overrides<F>(config: &mut PairConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if config.node.host.is_none() {
        config.node.host = non_empty("MY_POD_IP").or_else(|| non_empty("LOCAL_IP"));
    }
    if config.node.pod_name.is_none() {
        config.node.pod_name = non_empty("HOSTNAME");
    }
    if let Some(namespace) = non_empty("K8S_NAMESPACE") {
        config.kubernetes.namespace = namespace;
    }
}
