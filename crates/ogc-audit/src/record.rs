//! Durable audit records and the sink collaborator
//!
//! The sink is the sole durability guarantee for governance decisions; the
//! append-only writer behind it (and its hash chain) lives outside this
//! workspace. [`MemoryAuditSink`] is the reference implementation used by
//! tests and single-process deployments.

use crate::error::AuditError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ogc_context::{ActorId, CorrelationId, TenantId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed taxonomy of audit event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Guardrail pipeline stages
    Guardrail,
    /// Feature-gate resolution and mutation
    FeatureGate,
    /// Approval workflow transitions
    Approval,
    /// Executor invocations
    Execution,
    /// Parameter validation
    Validation,
    /// Tracker lifecycle and other internals
    System,
}

/// Outcome of one audited step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The step succeeded (check passed, transition applied)
    Success,
    /// The step denied the caller (expected governance outcome)
    Denied,
    /// The step failed internally
    Failure,
}

/// One immutable audit record
///
/// Carries the full causal provenance of a decision step: who, what,
/// which resource, how it ended, and the correlation id tying it to the
/// rest of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Tenant the step was scoped to
    pub tenant_id: TenantId,
    /// Actor driving the step
    pub actor_id: ActorId,
    /// Action name (e.g. `guardrail_check`, `approval_decision`)
    pub action: String,
    /// Resource type (e.g. `operation`, `feature_flag`, `approval_request`)
    pub resource_type: String,
    /// Resource identifier
    pub resource_id: String,
    /// Event category
    pub category: EventCategory,
    /// Step outcome
    pub outcome: EventOutcome,
    /// Correlation id of the decision chain
    pub correlation_id: CorrelationId,
    /// Operation-specific detail
    pub metadata: Value,
    /// Wall-clock time of the write
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a record stamped with the current time
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        actor_id: ActorId,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        category: EventCategory,
        outcome: EventOutcome,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            tenant_id,
            actor_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            category,
            outcome,
            correlation_id,
            metadata: Value::Null,
            recorded_at: Utc::now(),
        }
    }

    /// With a metadata bag attached
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Durable audit writer collaborator
///
/// Implementations must be append-only; records are never updated or
/// deleted once accepted.
#[async_trait]
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    /// Persist one record
    ///
    /// # Errors
    /// - `AuditError::SinkFailed` when the write cannot be made durable
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// In-memory append-only sink
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    inner: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Create an empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record written so far
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.lock().clone()
    }

    /// Records matching a correlation id, in write order
    #[must_use]
    pub fn records_for(&self, correlation_id: CorrelationId) -> Vec<AuditRecord> {
        self.inner
            .lock()
            .iter()
            .filter(|r| r.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    /// Number of records written
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the sink is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.inner.lock().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(correlation: CorrelationId) -> AuditRecord {
        AuditRecord::new(
            TenantId::new("t1"),
            ActorId::new("a1"),
            "guardrail_check",
            "operation",
            "TENANT_DELETION",
            EventCategory::Guardrail,
            EventOutcome::Denied,
            correlation,
        )
        .with_metadata(json!({"reason": "FEATURE_FLAG_DISABLED"}))
    }

    #[tokio::test]
    async fn memory_sink_appends() {
        let sink = MemoryAuditSink::new();
        let correlation = CorrelationId::new();

        sink.record(sample(correlation)).await.unwrap();
        sink.record(sample(correlation)).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records_for(correlation).len(), 2);
        assert!(sink.records_for(CorrelationId::new()).is_empty());
    }

    #[test]
    fn record_serializes_with_snake_case_taxonomy() {
        let record = sample(CorrelationId::new());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["category"], "guardrail");
        assert_eq!(json["outcome"], "denied");
    }
}
