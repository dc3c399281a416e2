//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for both the
//! instance daemon and the pod auditor. All types derive Serde traits for
//! deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration shared by `standby-pair` and `pod-audit`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PairConfig {
    /// Identity of this instance (advertised host, liveness port, pod name).
    pub node: NodeConfig,

    /// Liveness link and election timings.
    pub heartbeat: HeartbeatConfig,

    /// Shared coordination store holding the active record.
    pub registry: RegistryConfig,

    /// Kubernetes API access for role labels and pod inventory.
    pub kubernetes: KubernetesConfig,

    /// Application server started once this instance is active.
    pub app: AppConfig,

    /// Fleet reconciler schedule.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Instance identity.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Network-visible host. Falls back to `MY_POD_IP`, `LOCAL_IP`, then loopback.
    pub host: Option<String>,

    /// Liveness listener port. Absent means standalone mode.
    pub liveness_port: Option<u16>,

    /// Pod name used for role labels. Falls back to `HOSTNAME`.
    pub pod_name: Option<String>,
}

/// Liveness link and election timings, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Interval between liveness markers sent by the active instance.
    pub broadcast_interval_ms: u64,

    /// Connect timeout on the first dial to the recorded active.
    pub connect_timeout_ms: u64,

    /// Connect timeout on redials after a lost connection.
    pub retry_timeout_ms: u64,

    /// Maximum silence tolerated on an established link.
    pub read_timeout_ms: u64,

    /// Upper bound on a single marker write to one stand-by.
    pub write_timeout_ms: u64,

    /// Pause before dialing an instance that just took over.
    pub reassign_delay_ms: u64,

    /// How often the active instance re-writes itself to the registry.
    pub registry_refresh_ms: u64,

    /// Lower bound of the per-process claim jitter.
    pub jitter_min_ms: u64,

    /// Upper bound of the per-process claim jitter.
    pub jitter_max_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: 250,
            connect_timeout_ms: 4000,
            retry_timeout_ms: 1000,
            read_timeout_ms: 1000,
            write_timeout_ms: 250,
            reassign_delay_ms: 500,
            registry_refresh_ms: 5000,
            jitter_min_ms: 50,
            jitter_max_ms: 100,
        }
    }
}

impl HeartbeatConfig {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Connect-phase timeout; redials use the shorter retry timeout.
    pub fn connect_timeout(&self, retry: bool) -> Duration {
        if retry {
            Duration::from_millis(self.retry_timeout_ms)
        } else {
            Duration::from_millis(self.connect_timeout_ms)
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn reassign_delay(&self) -> Duration {
        Duration::from_millis(self.reassign_delay_ms)
    }

    pub fn registry_refresh(&self) -> Duration {
        Duration::from_millis(self.registry_refresh_ms)
    }
}

/// Coordination store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Store address (`host:port`, RESP2 protocol).
    pub address: String,

    /// Key holding the active instance address.
    pub key: String,

    /// Timeout for a single get/set round trip.
    pub op_timeout_ms: u64,

    /// Attempts per operation before the election gives up.
    pub max_attempts: u32,

    /// Base delay for exponential backoff between attempts.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff between attempts.
    pub max_delay_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6379".to_string(),
            key: "active".to_string(),
            op_timeout_ms: 2000,
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RegistryConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

/// Kubernetes API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Allow Kubernetes access at all. Still requires an API endpoint.
    pub enabled: bool,

    /// Namespace of the application pods.
    pub namespace: String,

    /// Pod label carrying the role (`active` / `stand-by`).
    pub role_label: String,

    /// Label selector matching the application pods.
    pub app_selector: String,

    /// Pod phase the auditor lists.
    pub running_phase: String,

    /// API server URL. Empty means derive it from the in-cluster environment.
    pub api_url: String,

    /// Service account token file.
    pub token_path: String,

    /// Cluster CA bundle (PEM).
    pub ca_path: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "default".to_string(),
            role_label: "mode".to_string(),
            app_selector: "app=app".to_string(),
            running_phase: "Running".to_string(),
            api_url: String::new(),
            token_path: "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string(),
            ca_path: "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Application server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Start the application server on activation.
    pub enabled: bool,

    /// Application port, bound on the advertised host.
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8082,
        }
    }
}

/// Fleet reconciler schedule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Period between full audit cycles, in seconds.
    pub period_secs: u64,

    /// Delay before re-checking an observed violation, in seconds.
    pub verification_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            period_secs: 10,
            verification_secs: 1,
        }
    }
}

impl AuditConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn verification_delay(&self) -> Duration {
        Duration::from_secs(self.verification_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
