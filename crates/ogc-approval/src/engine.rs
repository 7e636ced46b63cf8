//! The approval workflow engine
//!
//! Owns every transition of the request state machine and emits one audit
//! record per transition. Expiry is checked both lazily (on any access that
//! touches a PENDING request) and by the periodic sweep, so an expired
//! request rejects decisions even if the sweep never ran.

use crate::error::ApprovalError;
use crate::request::{
    validate_transition, ApprovalDecision, ApprovalRequest, ApprovalStatus, DecisionKind,
    RequestId, DEFAULT_TTL_HOURS,
};
use crate::store::ApprovalStore;
use chrono::{Duration, Utc};
use ogc_audit::{AuditTrail, EventCategory, EventOutcome, StepEvent};
use ogc_context::{ActorId, CorrelationId, TenantContext, TenantId};
use ogc_registry::OperationDefinition;
use serde_json::{json, Value};
use std::sync::Arc;

/// One decision submission
#[derive(Debug, Clone)]
pub struct DecisionInput {
    /// Request being decided
    pub request_id: RequestId,
    /// Deciding actor
    pub approver_id: ActorId,
    /// Approve or reject
    pub decision: DecisionKind,
    /// Free-form reason
    pub reason: String,
    /// Correlation id of the deciding call chain
    pub correlation_id: CorrelationId,
}

impl DecisionInput {
    /// Build an approve submission
    #[must_use]
    pub fn approve(
        request_id: RequestId,
        approver_id: impl Into<ActorId>,
        reason: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            request_id,
            approver_id: approver_id.into(),
            decision: DecisionKind::Approve,
            reason: reason.into(),
            correlation_id,
        }
    }

    /// Build a reject submission
    #[must_use]
    pub fn reject(
        request_id: RequestId,
        approver_id: impl Into<ActorId>,
        reason: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            request_id,
            approver_id: approver_id.into(),
            decision: DecisionKind::Reject,
            reason: reason.into(),
            correlation_id,
        }
    }
}

/// Multi-party approval engine
#[derive(Debug)]
pub struct ApprovalEngine {
    store: Arc<dyn ApprovalStore>,
    trail: Arc<AuditTrail>,
    ttl: Duration,
}

impl ApprovalEngine {
    /// Create an engine with the default 24h request lifetime
    #[must_use]
    pub fn new(store: Arc<dyn ApprovalStore>, trail: Arc<AuditTrail>) -> Self {
        Self {
            store,
            trail,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// With an explicit request lifetime
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Create a PENDING request for (operation, tenant, requester)
    ///
    /// The required-approver count comes from the operation's policy.
    /// Fails, never queues, when a PENDING request already holds the
    /// (operation, tenant) key.
    ///
    /// # Errors
    /// - `ApprovalError::NoApprovalRequired` for a policy of NONE
    /// - `ApprovalError::PendingExists` on a live PENDING conflict
    pub async fn create(
        &self,
        operation: &OperationDefinition,
        ctx: &TenantContext,
        parameters: Value,
        reason: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if !operation.policy.requires_approval() {
            return Err(ApprovalError::NoApprovalRequired(operation.name.clone()));
        }

        // Lazy expiry: a stale PENDING request must not block a new one.
        if let Some(stale) = self
            .store
            .find_pending(&operation.name, &ctx.tenant_id)
            .await?
        {
            if stale.is_expired_at(Utc::now()) {
                self.expire(stale.id).await?;
            }
        }

        let request = ApprovalRequest::new(
            operation.name.clone(),
            ctx.tenant_id.clone(),
            ctx.actor_id.clone(),
            parameters,
            reason,
            correlation_id,
            operation.policy.required_approvers(),
        )
        .with_expiry(Utc::now() + self.ttl);

        self.store.insert_pending(request.clone()).await?;
        tracing::info!(
            request = %request.id,
            operation = %operation.name,
            tenant = %ctx.tenant_id,
            required = request.required_approvers,
            "approval request created"
        );
        self.trail
            .track(
                correlation_id,
                &ctx.tenant_id,
                &ctx.actor_id,
                StepEvent::new(
                    "approval_request_created",
                    EventCategory::Approval,
                    EventOutcome::Success,
                )
                .with_resource("approval_request", request.id.to_string())
                .with_metadata(json!({
                    "operation": operation.name,
                    "required_approvers": request.required_approvers,
                    "status": request.status,
                    "expires_at": request.expires_at,
                })),
            )
            .await?;

        Ok(request)
    }

    /// Process one approve/reject decision
    ///
    /// # Errors
    /// - `ApprovalError::NotFound` / `AlreadyResolved` / `Expired` /
    ///   `SelfApproval` / `DuplicateDecision` per the workflow rules
    pub async fn decide(&self, input: DecisionInput) -> Result<ApprovalRequest, ApprovalError> {
        let now = Utc::now();
        // Validation and mutation commit as one unit under the store's
        // exclusive hold on the request. Concurrent decisions serialize,
        // and the later one re-validates against the earlier commit, so a
        // caller is never told a result the store does not hold.
        let applied = self
            .store
            .update_with(input.request_id, &|request| {
                if request.status != ApprovalStatus::Pending {
                    return Err(ApprovalError::AlreadyResolved {
                        status: request.status,
                    });
                }
                if request.is_expired_at(now) {
                    return Err(ApprovalError::Expired(request.id));
                }
                if input.approver_id == request.requester_id {
                    return Err(ApprovalError::SelfApproval);
                }
                if request.has_decided(&input.approver_id) {
                    return Err(ApprovalError::DuplicateDecision {
                        approver: input.approver_id.clone(),
                    });
                }

                request.decisions.push(ApprovalDecision {
                    approver_id: input.approver_id.clone(),
                    decision: input.decision,
                    reason: input.reason.clone(),
                    decided_at: Utc::now(),
                });

                let next = match input.decision {
                    // A single rejection is terminal, regardless of prior
                    // approvals.
                    DecisionKind::Reject => Some(ApprovalStatus::Rejected),
                    DecisionKind::Approve => {
                        (request.approval_count() >= request.required_approvers)
                            .then_some(ApprovalStatus::Approved)
                    }
                };
                if let Some(status) = next {
                    validate_transition(request.status, status)?;
                    request.status = status;
                }
                Ok(())
            })
            .await;

        let request = match applied {
            Ok(request) => request,
            Err(ApprovalError::Expired(id)) => {
                // Lazy expiry: transition the overdue request before failing.
                self.expire(id).await?;
                return Err(ApprovalError::Expired(id));
            }
            Err(other) => return Err(other),
        };
        tracing::info!(
            request = %request.id,
            approver = %input.approver_id,
            decision = ?input.decision,
            status = %request.status,
            "approval decision recorded"
        );
        self.trail
            .track(
                input.correlation_id,
                &request.tenant_id,
                &input.approver_id,
                StepEvent::new(
                    "approval_decision",
                    EventCategory::Approval,
                    EventOutcome::Success,
                )
                .with_resource("approval_request", request.id.to_string())
                .with_metadata(json!({
                    "decision": input.decision,
                    "resulting_status": request.status,
                    "approvals": request.approval_count(),
                    "required_approvers": request.required_approvers,
                })),
            )
            .await?;

        Ok(request)
    }

    /// The live PENDING request for (operation, tenant), lazily expired
    ///
    /// # Errors
    /// - store or audit failures only; absence is `Ok(None)`
    pub async fn find_pending(
        &self,
        operation: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ApprovalRequest>, ApprovalError> {
        match self.store.find_pending(operation, tenant_id).await? {
            Some(request) if request.is_expired_at(Utc::now()) => {
                self.expire(request.id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// The latest APPROVED request for (operation, tenant) still inside its
    /// expiry window
    ///
    /// # Errors
    /// - store failures only; absence is `Ok(None)`
    pub async fn find_approved(
        &self,
        operation: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ApprovalRequest>, ApprovalError> {
        Ok(self
            .store
            .find_approved(operation, tenant_id)
            .await?
            .filter(|r| !r.is_expired_at(Utc::now())))
    }

    /// Fetch a request by id
    ///
    /// # Errors
    /// - store failures only; absence is `Ok(None)`
    pub async fn get(&self, id: RequestId) -> Result<Option<ApprovalRequest>, ApprovalError> {
        self.store.get(id).await
    }

    /// Sweep every overdue PENDING request to EXPIRED
    ///
    /// # Errors
    /// - store or audit failures; already-swept requests are skipped
    pub async fn expire_overdue(&self) -> Result<usize, ApprovalError> {
        let now = Utc::now();
        let mut expired = 0;
        for request in self.store.all_pending().await? {
            if request.is_expired_at(now) && self.expire(request.id).await? {
                expired += 1;
            }
        }
        if expired > 0 {
            tracing::info!(count = expired, "expired overdue approval requests");
        }
        Ok(expired)
    }

    /// Transition an overdue request to EXPIRED and audit it
    ///
    /// Returns false when another caller resolved the request between the
    /// overdue check and the commit; there is nothing left to do then.
    async fn expire(&self, id: RequestId) -> Result<bool, ApprovalError> {
        let expired = match self
            .store
            .update_with(id, &|request| {
                validate_transition(request.status, ApprovalStatus::Expired)?;
                request.status = ApprovalStatus::Expired;
                Ok(())
            })
            .await
        {
            Ok(request) => request,
            Err(ApprovalError::IllegalTransition { .. }) => return Ok(false),
            Err(other) => return Err(other),
        };
        self.trail
            .track(
                expired.correlation_id,
                &expired.tenant_id,
                &expired.requester_id,
                StepEvent::new(
                    "approval_request_expired",
                    EventCategory::Approval,
                    EventOutcome::Success,
                )
                .with_resource("approval_request", expired.id.to_string())
                .with_metadata(json!({
                    "operation": expired.operation,
                    "expired_at": expired.expires_at,
                })),
            )
            .await?;
        Ok(true)
    }
}

/// Run the expiry sweep on a fixed interval until the task is aborted
pub fn spawn_expiry_sweep(
    engine: Arc<ApprovalEngine>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = engine.expire_overdue().await {
                tracing::warn!(error = %e, "approval expiry sweep failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryApprovalStore;
    use ogc_audit::MemoryAuditSink;
    use ogc_context::ActorRole;
    use ogc_registry::{ApprovalPolicy, OperationRegistry};

    fn engine() -> (Arc<MemoryAuditSink>, ApprovalEngine) {
        let sink = Arc::new(MemoryAuditSink::new());
        let trail = Arc::new(AuditTrail::new(sink.clone()));
        let engine = ApprovalEngine::new(Arc::new(MemoryApprovalStore::new()), trail);
        (sink, engine)
    }

    fn multi_admin_op() -> Arc<OperationDefinition> {
        OperationRegistry::with_builtin()
            .lookup("TENANT_DELETION")
            .unwrap()
    }

    fn single_admin_op() -> Arc<OperationDefinition> {
        OperationRegistry::with_builtin()
            .lookup("BULK_DATA_PURGE")
            .unwrap()
    }

    fn requester() -> TenantContext {
        TenantContext::new("t1", "requester-a", ActorRole::Admin)
    }

    #[tokio::test]
    async fn create_uses_policy_quorum() {
        let (_sink, engine) = engine();
        let request = engine
            .create(
                &multi_admin_op(),
                &requester(),
                json!({}),
                "cleanup",
                CorrelationId::new(),
            )
            .await
            .unwrap();

        assert_eq!(request.status, ApprovalStatus::Pending);
        assert_eq!(request.required_approvers, 2);
    }

    #[tokio::test]
    async fn create_rejects_policy_none() {
        let (_sink, engine) = engine();
        let op = OperationDefinition::new("HARMLESS", ogc_registry::RiskLevel::Low)
            .with_policy(ApprovalPolicy::None);
        let err = engine
            .create(&op, &requester(), json!({}), "r", CorrelationId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NoApprovalRequired(_)));
    }

    #[tokio::test]
    async fn second_create_conflicts_while_pending() {
        let (_sink, engine) = engine();
        let op = multi_admin_op();
        let ctx = requester();

        engine
            .create(&op, &ctx, json!({}), "first", CorrelationId::new())
            .await
            .unwrap();
        let err = engine
            .create(&op, &ctx, json!({}), "second", CorrelationId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::PendingExists { .. }));
    }

    #[tokio::test]
    async fn multi_admin_quorum_flow() {
        let (_sink, engine) = engine();
        let correlation = CorrelationId::new();
        let request = engine
            .create(&multi_admin_op(), &requester(), json!({}), "cleanup", correlation)
            .await
            .unwrap();

        let after_one = engine
            .decide(DecisionInput::approve(request.id, "admin-b", "ok", correlation))
            .await
            .unwrap();
        assert_eq!(after_one.status, ApprovalStatus::Pending);
        assert_eq!(after_one.approval_count(), 1);

        let after_two = engine
            .decide(DecisionInput::approve(request.id, "admin-c", "ok", correlation))
            .await
            .unwrap();
        assert_eq!(after_two.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn single_reject_is_terminal_despite_prior_approvals() {
        let (_sink, engine) = engine();
        let correlation = CorrelationId::new();
        let request = engine
            .create(&multi_admin_op(), &requester(), json!({}), "cleanup", correlation)
            .await
            .unwrap();

        engine
            .decide(DecisionInput::approve(request.id, "admin-b", "ok", correlation))
            .await
            .unwrap();
        let rejected = engine
            .decide(DecisionInput::reject(request.id, "admin-c", "no", correlation))
            .await
            .unwrap();
        assert_eq!(rejected.status, ApprovalStatus::Rejected);

        // Terminal: further decisions fail.
        let err = engine
            .decide(DecisionInput::approve(request.id, "admin-d", "late", correlation))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::AlreadyResolved {
                status: ApprovalStatus::Rejected
            }
        ));
    }

    #[tokio::test]
    async fn concurrent_decisions_never_lose_the_rejection() {
        // An approve and a reject raced on one PENDING request must
        // serialize: every acknowledged decision stays in the stored
        // request and the rejection is terminal there, whichever order
        // the commits land in.
        for _ in 0..32 {
            let (_sink, engine) = engine();
            let engine = Arc::new(engine);
            let correlation = CorrelationId::new();
            let request = engine
                .create(&multi_admin_op(), &requester(), json!({}), "cleanup", correlation)
                .await
                .unwrap();
            let id = request.id;

            let approve = {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .decide(DecisionInput::approve(id, "admin-b", "ok", correlation))
                        .await
                })
            };
            let reject = {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .decide(DecisionInput::reject(id, "admin-c", "no", correlation))
                        .await
                })
            };
            let approve_res = approve.await.unwrap();
            let rejected = reject.await.unwrap().unwrap();
            assert_eq!(rejected.status, ApprovalStatus::Rejected);

            let stored = engine.get(id).await.unwrap().unwrap();
            assert_eq!(stored.status, ApprovalStatus::Rejected);
            assert!(stored
                .decisions
                .iter()
                .any(|d| d.decision == DecisionKind::Reject
                    && d.approver_id.as_str() == "admin-c"));
            match approve_res {
                // The approve committed first; both decisions are retained.
                Ok(after) => {
                    assert_eq!(after.approval_count(), 1);
                    assert_eq!(stored.decisions.len(), 2);
                }
                // The reject committed first; the approve saw the terminal
                // state instead of overwriting it.
                Err(ApprovalError::AlreadyResolved {
                    status: ApprovalStatus::Rejected,
                }) => {
                    assert_eq!(stored.decisions.len(), 1);
                }
                Err(other) => panic!("unexpected decide error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn self_approval_is_rejected() {
        let (_sink, engine) = engine();
        let correlation = CorrelationId::new();
        let ctx = requester();
        let request = engine
            .create(&multi_admin_op(), &ctx, json!({}), "cleanup", correlation)
            .await
            .unwrap();

        let err = engine
            .decide(DecisionInput::approve(
                request.id,
                ctx.actor_id.as_str(),
                "me",
                correlation,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::SelfApproval));
    }

    #[tokio::test]
    async fn duplicate_decision_is_rejected() {
        let (_sink, engine) = engine();
        let correlation = CorrelationId::new();
        let request = engine
            .create(&multi_admin_op(), &requester(), json!({}), "cleanup", correlation)
            .await
            .unwrap();

        engine
            .decide(DecisionInput::approve(request.id, "admin-b", "ok", correlation))
            .await
            .unwrap();
        let err = engine
            .decide(DecisionInput::approve(request.id, "admin-b", "again", correlation))
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::DuplicateDecision { .. }));
    }

    #[tokio::test]
    async fn expired_request_rejects_decisions_without_sweep() {
        let (_sink, engine) = engine();
        let engine = engine.with_ttl(Duration::milliseconds(-1));
        let correlation = CorrelationId::new();
        let request = engine
            .create(&single_admin_op(), &requester(), json!({}), "cleanup", correlation)
            .await
            .unwrap();

        let err = engine
            .decide(DecisionInput::approve(request.id, "admin-b", "late", correlation))
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::Expired(_)));

        // The lazy check transitioned it.
        let stored = engine.get(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Expired);
    }

    #[tokio::test]
    async fn stale_pending_does_not_block_a_new_request() {
        let (_sink, engine) = engine();
        let op = single_admin_op();
        let ctx = requester();

        let short = engine.with_ttl(Duration::milliseconds(-1));
        short
            .create(&op, &ctx, json!({}), "stale", CorrelationId::new())
            .await
            .unwrap();

        // A new create lazily expires the stale one and wins the key.
        let fresh = short.with_ttl(Duration::hours(1));
        let request = fresh
            .create(&op, &ctx, json!({}), "fresh", CorrelationId::new())
            .await
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);
    }

    #[tokio::test]
    async fn sweep_expires_overdue_requests() {
        let (_sink, engine) = engine();
        let short = engine.with_ttl(Duration::milliseconds(-1));
        let request = short
            .create(
                &single_admin_op(),
                &requester(),
                json!({}),
                "cleanup",
                CorrelationId::new(),
            )
            .await
            .unwrap();

        let swept = short.expire_overdue().await.unwrap();
        assert_eq!(swept, 1);
        assert_eq!(
            short.get(request.id).await.unwrap().unwrap().status,
            ApprovalStatus::Expired
        );
        // Second sweep finds nothing.
        assert_eq!(short.expire_overdue().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn every_transition_is_audited() {
        let (sink, engine) = engine();
        let correlation = CorrelationId::new();
        let request = engine
            .create(&single_admin_op(), &requester(), json!({}), "cleanup", correlation)
            .await
            .unwrap();
        engine
            .decide(DecisionInput::approve(request.id, "admin-b", "ok", correlation))
            .await
            .unwrap();

        let records = sink.records_for(correlation);
        let actions: Vec<&str> = records.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["approval_request_created", "approval_decision"]);
        assert!(records
            .iter()
            .all(|r| r.resource_type == "approval_request"));
    }

    #[tokio::test]
    async fn find_approved_respects_expiry_window() {
        let (_sink, engine) = engine();
        let correlation = CorrelationId::new();
        let op = single_admin_op();
        let ctx = requester();
        let request = engine
            .create(&op, &ctx, json!({}), "cleanup", correlation)
            .await
            .unwrap();
        engine
            .decide(DecisionInput::approve(request.id, "admin-b", "ok", correlation))
            .await
            .unwrap();

        let found = engine
            .find_approved(&op.name, &ctx.tenant_id)
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(engine
            .find_approved(&op.name, &TenantId::new("t2"))
            .await
            .unwrap()
            .is_none());
    }
}
