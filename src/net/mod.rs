//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Liveness listener (active side)
//!     → listener.rs (bind once at startup, accept loop)
//!     → connection.rs (connection ids, live-connection registry)
//!     → Hand off to the liveness server for marker broadcast
//!
//! Connection States:
//!     Accepted → Live → Dead (write failed) → Removed (close observed)
//! ```
//!
//! # Design Decisions
//! - Bind failure is the only fatal network error; it surfaces at startup
//! - Each connection gets an id so close events can find their entry
//! - The registry is owned by one task; no locking

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, ConnectionRegistry, ConnectionState};
pub use listener::{Listener, ListenerError};
