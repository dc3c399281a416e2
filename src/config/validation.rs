//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, jitter window ordered)
//! - Reject empty identifiers the protocol depends on
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PairConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::PairConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &PairConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let hb = &config.heartbeat;

    let positive = [
        ("heartbeat.broadcast_interval_ms", hb.broadcast_interval_ms),
        ("heartbeat.connect_timeout_ms", hb.connect_timeout_ms),
        ("heartbeat.retry_timeout_ms", hb.retry_timeout_ms),
        ("heartbeat.read_timeout_ms", hb.read_timeout_ms),
        ("heartbeat.write_timeout_ms", hb.write_timeout_ms),
        ("heartbeat.registry_refresh_ms", hb.registry_refresh_ms),
        ("registry.op_timeout_ms", config.registry.op_timeout_ms),
        ("audit.period_secs", config.audit.period_secs),
        ("audit.verification_secs", config.audit.verification_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if hb.jitter_min_ms > hb.jitter_max_ms {
        errors.push(ValidationError::new(
            "heartbeat.jitter_min_ms",
            format!(
                "jitter window is inverted ({} > {})",
                hb.jitter_min_ms, hb.jitter_max_ms
            ),
        ));
    }

    if hb.read_timeout_ms != 0 && hb.broadcast_interval_ms >= hb.read_timeout_ms {
        errors.push(ValidationError::new(
            "heartbeat.broadcast_interval_ms",
            "must be shorter than heartbeat.read_timeout_ms",
        ));
    }

    if config.registry.max_attempts == 0 {
        errors.push(ValidationError::new("registry.max_attempts", "must be at least 1"));
    }
    if config.registry.key.trim().is_empty() {
        errors.push(ValidationError::new("registry.key", "must not be empty"));
    }
    if config.registry.address.trim().is_empty() {
        errors.push(ValidationError::new("registry.address", "must not be empty"));
    }

    if config.kubernetes.role_label.trim().is_empty() {
        errors.push(ValidationError::new("kubernetes.role_label", "must not be empty"));
    }

    if config.node.liveness_port == Some(config.app.port) && config.app.enabled {
        errors.push(ValidationError::new(
            "app.port",
            "must differ from node.liveness_port",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
