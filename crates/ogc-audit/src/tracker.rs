//! Live correlation trackers
//!
//! A tracker is the in-memory view of one causal decision chain. It is
//! owned by the task driving that chain, appended to by every component the
//! chain passes through, and evicted on `end` once the durable summary
//! record is written. Trackers are reconstructible state: losing one never
//! loses provenance, because every step already wrote its own record.

use crate::error::AuditError;
use crate::metrics::{classify, AuditMetrics, HealthReport};
use crate::record::{AuditRecord, AuditSink, EventCategory, EventOutcome};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ogc_context::{ActorId, CorrelationId, TenantId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// One timestamped event within a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    /// Event name
    pub name: String,
    /// Category
    pub category: EventCategory,
    /// Outcome
    pub outcome: EventOutcome,
    /// Wall-clock time of the event
    pub at: DateTime<Utc>,
    /// Milliseconds since the previous event (or tracker start)
    pub elapsed_ms: u64,
    /// Operation-specific detail
    pub metadata: Value,
}

/// Live state of one causal decision chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationTracker {
    /// Correlation id
    pub correlation_id: CorrelationId,
    /// Tenant the chain is scoped to
    pub tenant_id: TenantId,
    /// Actor driving the chain
    pub actor_id: ActorId,
    /// When the chain started
    pub started_at: DateTime<Utc>,
    /// Ordered events
    pub events: Vec<TrackedEvent>,
}

impl CorrelationTracker {
    fn new(correlation_id: CorrelationId, tenant_id: TenantId, actor_id: ActorId) -> Self {
        Self {
            correlation_id,
            tenant_id,
            actor_id,
            started_at: Utc::now(),
            events: Vec::new(),
        }
    }

    fn last_event_at(&self) -> DateTime<Utc> {
        self.events.last().map_or(self.started_at, |e| e.at)
    }

    /// Total wall-clock duration of the chain so far, in milliseconds
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        let end = self.last_event_at();
        u64::try_from((end - self.started_at).num_milliseconds().max(0)).unwrap_or(0)
    }
}

/// One decision-chain step, ready to be tracked
///
/// Built with the usual builder idiom; resource and metadata default to
/// empty so terse call sites stay terse.
#[derive(Debug, Clone)]
pub struct StepEvent {
    /// Event name (e.g. `registry_lookup`, `approval_decision`)
    pub name: String,
    /// Category
    pub category: EventCategory,
    /// Outcome
    pub outcome: EventOutcome,
    /// Resource type the step touched
    pub resource_type: String,
    /// Resource identifier
    pub resource_id: String,
    /// Operation-specific detail
    pub metadata: Value,
}

impl StepEvent {
    /// Create a step event
    #[must_use]
    pub fn new(name: impl Into<String>, category: EventCategory, outcome: EventOutcome) -> Self {
        Self {
            name: name.into(),
            category,
            outcome,
            resource_type: String::new(),
            resource_id: String::new(),
            metadata: Value::Null,
        }
    }

    /// With the resource the step touched
    #[must_use]
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = resource_type.into();
        self.resource_id = resource_id.into();
        self
    }

    /// With a metadata bag
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The audit trail: live trackers plus the durable sink
///
/// Explicitly constructed and shared behind `Arc`; every OGC component
/// holds one and funnels its decision points through it.
#[derive(Debug)]
pub struct AuditTrail {
    live: DashMap<CorrelationId, CorrelationTracker>,
    sink: Arc<dyn AuditSink>,
    counters: Mutex<AuditMetrics>,
}

impl AuditTrail {
    /// Create a trail over a durable sink
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            live: DashMap::new(),
            sink,
            counters: Mutex::new(AuditMetrics::default()),
        }
    }

    /// Start a tracker for a new decision chain
    ///
    /// Idempotent: starting an already-live correlation id keeps the
    /// existing tracker. When `initial_event` is given it is tracked (and
    /// durably recorded) as the first step.
    ///
    /// # Errors
    /// - `AuditError::SinkFailed` when the initial event cannot be recorded
    pub async fn start(
        &self,
        correlation_id: CorrelationId,
        tenant_id: &TenantId,
        actor_id: &ActorId,
        initial_event: Option<&str>,
    ) -> Result<(), AuditError> {
        let started = {
            let mut fresh = false;
            self.live.entry(correlation_id).or_insert_with(|| {
                fresh = true;
                CorrelationTracker::new(correlation_id, tenant_id.clone(), actor_id.clone())
            });
            fresh
        };
        if started {
            self.counters.lock().trackers_started += 1;
        }

        if let Some(name) = initial_event {
            self.track(
                correlation_id,
                tenant_id,
                actor_id,
                StepEvent::new(name, EventCategory::System, EventOutcome::Success),
            )
            .await?;
        }
        Ok(())
    }

    /// Track one step of a decision chain
    ///
    /// An unknown correlation id implicitly starts a tracker rather than
    /// failing; the implicit start is counted and tagged in the event
    /// metadata so dropped `start` calls stay visible.
    ///
    /// Writes exactly one durable record per call.
    ///
    /// # Errors
    /// - `AuditError::SinkFailed` when the durable write fails
    pub async fn track(
        &self,
        correlation_id: CorrelationId,
        tenant_id: &TenantId,
        actor_id: &ActorId,
        event: StepEvent,
    ) -> Result<(), AuditError> {
        let mut metadata = event.metadata.clone();
        let elapsed_ms = {
            let mut implicit = false;
            let mut entry = self.live.entry(correlation_id).or_insert_with(|| {
                implicit = true;
                CorrelationTracker::new(correlation_id, tenant_id.clone(), actor_id.clone())
            });
            if implicit {
                let mut counters = self.counters.lock();
                counters.trackers_started += 1;
                counters.implicit_starts += 1;
                tracing::warn!(
                    correlation = %correlation_id,
                    event = %event.name,
                    "tracking against an unknown correlation id; starting tracker implicitly"
                );
                match &mut metadata {
                    Value::Object(map) => {
                        map.insert("implicit_start".to_string(), Value::Bool(true));
                    }
                    Value::Null => metadata = json!({"implicit_start": true}),
                    other => metadata = json!({"implicit_start": true, "detail": other}),
                }
            }

            let at = Utc::now();
            let elapsed_ms =
                u64::try_from((at - entry.last_event_at()).num_milliseconds().max(0)).unwrap_or(0);
            entry.events.push(TrackedEvent {
                name: event.name.clone(),
                category: event.category,
                outcome: event.outcome,
                at,
                elapsed_ms,
                metadata: metadata.clone(),
            });
            elapsed_ms
        };

        {
            let mut counters = self.counters.lock();
            counters.total_events += 1;
            match event.category {
                EventCategory::Guardrail => {
                    counters.guardrail_checks += 1;
                    match event.outcome {
                        EventOutcome::Denied => counters.guardrail_denials += 1,
                        EventOutcome::Failure => counters.guardrail_errors += 1,
                        EventOutcome::Success => {}
                    }
                }
                EventCategory::Approval => counters.approval_events += 1,
                EventCategory::Execution => counters.executions += 1,
                EventCategory::FeatureGate
                | EventCategory::Validation
                | EventCategory::System => {}
            }
        }

        let record = AuditRecord::new(
            tenant_id.clone(),
            actor_id.clone(),
            event.name,
            event.resource_type,
            event.resource_id,
            event.category,
            event.outcome,
            correlation_id,
        )
        .with_metadata(match metadata {
            Value::Null => json!({ "elapsed_ms": elapsed_ms }),
            Value::Object(mut map) => {
                map.insert("elapsed_ms".to_string(), json!(elapsed_ms));
                Value::Object(map)
            }
            other => json!({ "elapsed_ms": elapsed_ms, "detail": other }),
        });

        self.write(record).await
    }

    /// Finalize a decision chain
    ///
    /// Writes a summary record (total duration, full event list) and evicts
    /// the live tracker; the durable log is the system of record thereafter.
    /// Ending an unknown correlation id is a no-op.
    ///
    /// # Errors
    /// - `AuditError::SinkFailed` when the summary write fails
    pub async fn end(
        &self,
        correlation_id: CorrelationId,
        final_outcome: EventOutcome,
        metadata: Value,
    ) -> Result<Option<CorrelationTracker>, AuditError> {
        let Some((_, tracker)) = self.live.remove(&correlation_id) else {
            return Ok(None);
        };
        self.counters.lock().trackers_ended += 1;

        let record = AuditRecord::new(
            tracker.tenant_id.clone(),
            tracker.actor_id.clone(),
            "correlation_end",
            "correlation",
            correlation_id.to_string(),
            EventCategory::System,
            final_outcome,
            correlation_id,
        )
        .with_metadata(json!({
            "total_duration_ms": tracker.total_duration_ms(),
            "event_count": tracker.events.len(),
            "events": tracker.events,
            "detail": metadata,
        }));

        self.write(record).await?;
        Ok(Some(tracker))
    }

    async fn write(&self, record: AuditRecord) -> Result<(), AuditError> {
        match self.sink.record(record).await {
            Ok(()) => {
                self.counters.lock().records_written += 1;
                Ok(())
            }
            Err(e) => {
                self.counters.lock().sink_failures += 1;
                tracing::error!(error = %e, "durable audit write failed");
                Err(e)
            }
        }
    }

    /// Snapshot of the aggregate counters
    #[must_use]
    pub fn metrics(&self) -> AuditMetrics {
        *self.counters.lock()
    }

    /// Derive the health report from the current counters
    #[must_use]
    pub fn generate_report(&self) -> HealthReport {
        classify(self.metrics())
    }

    /// Number of live trackers
    #[must_use]
    pub fn live_trackers(&self) -> usize {
        self.live.len()
    }

    /// Clone of a live tracker, if present
    #[must_use]
    pub fn tracker(&self, correlation_id: CorrelationId) -> Option<CorrelationTracker> {
        self.live.get(&correlation_id).map(|t| t.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MemoryAuditSink;

    fn trail() -> (Arc<MemoryAuditSink>, AuditTrail) {
        let sink = Arc::new(MemoryAuditSink::new());
        let trail = AuditTrail::new(sink.clone());
        (sink, trail)
    }

    fn ids() -> (TenantId, ActorId) {
        (TenantId::new("t1"), ActorId::new("a1"))
    }

    #[tokio::test]
    async fn start_track_end_lifecycle() {
        let (sink, trail) = trail();
        let (tenant, actor) = ids();
        let correlation = CorrelationId::new();

        trail
            .start(correlation, &tenant, &actor, Some("guardrail_check"))
            .await
            .unwrap();
        trail
            .track(
                correlation,
                &tenant,
                &actor,
                StepEvent::new(
                    "registry_lookup",
                    EventCategory::Guardrail,
                    EventOutcome::Success,
                )
                .with_resource("operation", "TENANT_DELETION"),
            )
            .await
            .unwrap();
        assert_eq!(trail.live_trackers(), 1);

        let tracker = trail
            .end(correlation, EventOutcome::Success, Value::Null)
            .await
            .unwrap()
            .expect("tracker was live");

        assert_eq!(tracker.events.len(), 2);
        assert_eq!(trail.live_trackers(), 0);
        // Initial event + tracked step + summary.
        assert_eq!(sink.records_for(correlation).len(), 3);
    }

    #[tokio::test]
    async fn track_unknown_correlation_starts_implicitly() {
        let (sink, trail) = trail();
        let (tenant, actor) = ids();
        let correlation = CorrelationId::new();

        trail
            .track(
                correlation,
                &tenant,
                &actor,
                StepEvent::new("late_event", EventCategory::Guardrail, EventOutcome::Denied),
            )
            .await
            .unwrap();

        assert_eq!(trail.live_trackers(), 1);
        let metrics = trail.metrics();
        assert_eq!(metrics.implicit_starts, 1);
        assert_eq!(metrics.trackers_started, 1);

        let record = &sink.records_for(correlation)[0];
        assert_eq!(record.metadata["implicit_start"], true);
    }

    #[tokio::test]
    async fn counters_classify_by_category_and_outcome() {
        let (_sink, trail) = trail();
        let (tenant, actor) = ids();
        let correlation = CorrelationId::new();
        trail.start(correlation, &tenant, &actor, None).await.unwrap();

        for outcome in [EventOutcome::Success, EventOutcome::Denied, EventOutcome::Failure] {
            trail
                .track(
                    correlation,
                    &tenant,
                    &actor,
                    StepEvent::new("check", EventCategory::Guardrail, outcome),
                )
                .await
                .unwrap();
        }
        trail
            .track(
                correlation,
                &tenant,
                &actor,
                StepEvent::new("created", EventCategory::Approval, EventOutcome::Success),
            )
            .await
            .unwrap();

        let metrics = trail.metrics();
        assert_eq!(metrics.total_events, 4);
        assert_eq!(metrics.guardrail_checks, 3);
        assert_eq!(metrics.guardrail_denials, 1);
        assert_eq!(metrics.guardrail_errors, 1);
        assert_eq!(metrics.approval_events, 1);
        assert_eq!(metrics.implicit_starts, 0);
    }

    #[tokio::test]
    async fn end_unknown_correlation_is_noop() {
        let (sink, trail) = trail();
        let out = trail
            .end(CorrelationId::new(), EventOutcome::Success, Value::Null)
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn report_reflects_error_ratio() {
        let (_sink, trail) = trail();
        let (tenant, actor) = ids();
        let correlation = CorrelationId::new();
        trail.start(correlation, &tenant, &actor, None).await.unwrap();

        for _ in 0..8 {
            trail
                .track(
                    correlation,
                    &tenant,
                    &actor,
                    StepEvent::new("check", EventCategory::Guardrail, EventOutcome::Failure),
                )
                .await
                .unwrap();
        }

        let report = trail.generate_report();
        assert_eq!(report.health, crate::metrics::SystemHealth::Warning);
    }
}
