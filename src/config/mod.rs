//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → PairConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults so an instance runs with no file at all
//! - Pod-provided environment (`MY_POD_IP`, `HOSTNAME`, `K8S_NAMESPACE`)
//!   fills whatever the file leaves unset
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AppConfig, AuditConfig, HeartbeatConfig, KubernetesConfig, LogFormat, NodeConfig,
    ObservabilityConfig, PairConfig, RegistryConfig,
};
