//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Registry call from the election:
//!     → retries.rs (bounded attempts, classify exhausted as fatal)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline (enforced by the callee)
//! - Jittered backoff keeps competing instances from retrying in lockstep
//! - Exhausting the retry budget is reported, not hidden

pub mod backoff;
pub mod retries;

pub use backoff::{calculate_backoff, claim_jitter};
pub use retries::{retry_with_backoff, RetryPolicy, RetriesExhausted};
