//! Observability for predicate evaluation
//!
//! - Structured logging (JSON lines)
//! - Passive counters
//! - Begin/complete scopes around whole-segment evaluation
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No effect on evaluation results or strategy choice
//! 3. No background threads
//!
//! ```ignore
//! use segeval::observability::{Logger, MetricsRegistry};
//!
//! Logger::info("SEGMENT_LOADED", &[("segment", "7")]);
//! let metrics = MetricsRegistry::new();
//! metrics.increment_raw_scan();
//! ```

mod logger;
mod metrics;
mod scope;

pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;
