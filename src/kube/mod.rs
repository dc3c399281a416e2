//! Kubernetes subsystem.
//!
//! # Data Flow
//! ```text
//! Election role change → announcer.rs → PATCH pod labels (JSON patch)
//! Audit cycle          → inventory.rs → GET pods (label + phase selectors)
//!                                     → DELETE pod per violating instance
//!                      all via client.rs (reqwest, service account token)
//! ```
//!
//! # Design Decisions
//! - Only pod list / patch / delete are needed, so a thin REST client is used
//! - Outside a cluster the instance runs with a logging-only announcer
//! - Every request carries a timeout; failures surface as `KubeError`

pub mod announcer;
pub mod client;
pub mod inventory;
pub mod types;

pub use announcer::{DetachedAnnouncer, PodLabelAnnouncer, RoleAnnouncer};
pub use client::KubeClient;
pub use inventory::{KubePodInventory, PodInventory};
pub use types::{KubeError, KubeResult, PodRecord};
