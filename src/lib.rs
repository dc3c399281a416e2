//! Active/stand-by pair coordination.
//!
//! Keeps exactly one instance of a redundant pair active. Each instance runs
//! an election over a shared registry record and a direct liveness link to
//! the current active; a separate fleet audit removes instances that break
//! the single-active invariant.

// Core subsystems
pub mod audit;
pub mod election;
pub mod liveness;
pub mod net;

// Collaborators
pub mod http;
pub mod kube;
pub mod registry;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::PairConfig;
pub use election::{ElectionController, InstanceHandle, Role};
pub use lifecycle::Shutdown;
