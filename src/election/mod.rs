//! Election subsystem.
//!
//! # Data Flow
//! ```text
//! initialize(port?)
//!     no port → Active (standalone)
//!     port    → bind liveness listener → announce stand-by
//!             → controller task: Resolve → Dial / Claim → ... → Active
//!             → activation signal fires once → app server starts
//! ```
//!
//! # Design Decisions
//! - One task owns the election state; observers only read a watch channel
//! - Claims are last-writer-wins with a per-process jitter before
//!   re-reading; dual claims are possible and left to the fleet audit
//! - Registry failures are retried with backoff, then end the election

pub mod activation;
pub mod controller;
pub mod state;

pub use activation::{activation_signal, ActivationListener, ActivationTrigger};
pub use controller::{ElectionController, ElectionError, InstanceHandle};
pub use state::{ElectionState, InstanceAddress, Role};
