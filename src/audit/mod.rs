//! Fleet audit subsystem.
//!
//! # Data Flow
//! ```text
//! every period:
//!     PodInventory::list → classify.rs (running pods only)
//!     → consistent / too small: clear verification flag
//!     → violation, first sighting: set flag, re-check after verification delay
//!     → violation, flag set: delete violators (independently), clear flag
//! ```
//!
//! # Design Decisions
//! - Labels are eventually consistent, so one snapshot never triggers deletion
//! - List errors look like an empty fleet; delete errors are logged per pod
//! - The loop itself never stops on errors

pub mod classify;
pub mod reconciler;

pub use classify::{classify, Verdict};
pub use reconciler::{CycleAction, CycleOutcome, Reconciler};
