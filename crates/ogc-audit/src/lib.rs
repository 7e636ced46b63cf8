//! OGC Audit - Correlation tracking and the durable audit trail
//!
//! Every governance decision point writes exactly one structured audit
//! record; the durable sink is the system of record, the in-memory trackers
//! are only a live cache over it. Provides:
//! - [`AuditRecord`] and the [`AuditSink`] collaborator trait
//! - [`CorrelationTracker`]s keyed by correlation id
//! - Aggregate counters and a three-level health report
//!
//! # Example
//!
//! ```rust,ignore
//! use ogc_audit::{AuditTrail, EventCategory, EventOutcome, MemoryAuditSink, StepEvent};
//!
//! let trail = AuditTrail::new(Arc::new(MemoryAuditSink::new()));
//! trail.start(correlation, &tenant, &actor, Some("guardrail_check")).await?;
//! let event = StepEvent::new("registry_lookup", EventCategory::Guardrail, EventOutcome::Success);
//! trail.track(correlation, &tenant, &actor, event).await?;
//! trail.end(correlation, EventOutcome::Success, json!({})).await?;
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod metrics;
pub mod record;
pub mod tracker;

pub use error::AuditError;
pub use metrics::{AlertSeverity, AuditMetrics, HealthAlert, HealthReport, SystemHealth};
pub use record::{AuditRecord, AuditSink, EventCategory, EventOutcome, MemoryAuditSink};
pub use tracker::{AuditTrail, CorrelationTracker, StepEvent, TrackedEvent};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
