//! Active registry subsystem.
//!
//! # Data Flow
//! ```text
//! Election step (connect / claim / refresh)
//!     → ActiveRegistry::get / ::set
//!     → redis.rs (RESP2 GET/SET against the shared store)
//!       or memory.rs (process-local, tests and single-host setups)
//! ```
//!
//! # Design Decisions
//! - One key, last write wins; no TTL and no compare-and-set
//! - Staleness is detected by the liveness link, never by the record
//! - Implementations report failures; retry policy lives with the caller

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryRegistry;
pub use redis::RedisRegistry;

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Connection or socket failure.
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store did not answer within the operation timeout.
    #[error("registry operation timed out after {0} ms")]
    Timeout(u64),

    /// The store answered with an error or an unexpected frame.
    #[error("registry protocol error: {0}")]
    Protocol(String),

    /// The store is unreachable (used by test doubles and closed connections).
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Shared record of the address of the active instance.
#[async_trait]
pub trait ActiveRegistry: Send + Sync {
    /// Read the recorded active address, if any.
    async fn get_active(&self) -> Result<Option<String>, RegistryError>;

    /// Unconditionally overwrite the recorded active address.
    async fn set_active(&self, address: &str) -> Result<(), RegistryError>;
}
