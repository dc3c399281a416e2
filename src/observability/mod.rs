//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Election, liveness link, registry, reconciler produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (address, state, pod)
//! - Metrics are cheap and recorded even when no exporter is installed

pub mod logging;
pub mod metrics;
