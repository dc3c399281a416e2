//! Application HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! activation signal fires
//!     → bind host:app.port
//!     → server.rs (Axum router, tracing, timeout)
//!     → request.rs (request ID on every request)
//!     → handlers: /, /state, /role
//! ```

pub mod request;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use server::{AppServer, AppState};
