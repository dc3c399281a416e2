//! Liveness link subsystem.
//!
//! # Data Flow
//! ```text
//! Active instance (server.rs):
//!     accept stand-by → connection registry
//!     every broadcast tick → write MARKER to each live connection
//!     reader sees EOF/error → entry removed
//!
//! Stand-by instance (client.rs):
//!     dial recorded active (connect timeout)
//!     → read markers (read timeout)
//!     → LinkEnd (loss, any marker heard) handed back to the election
//! ```
//!
//! # Design Decisions
//! - Pure liveness signal: marker content is never parsed
//! - A link counts as proven only once a marker arrives; a silent or
//!   refused link sends the election back to the registry
//! - Socket errors are values, never panics

pub mod client;
pub mod server;

pub use client::{dial, watch_markers, DialError, LinkEnd, LinkLoss};
pub use server::LivenessServer;

/// Token written by the active instance on every broadcast tick.
pub const MARKER: &[u8] = b"OK";
