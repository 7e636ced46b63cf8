//! Approval requests and their state machine
//!
//! PENDING is the only non-terminal state. Requests are retained forever
//! for audit; "expired" and "rejected" are states, not deletions.

use crate::error::ApprovalError;
use chrono::{DateTime, Duration, Utc};
use ogc_context::{ActorId, CorrelationId, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique approval-request identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a fresh request id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Awaiting decisions
    Pending,
    /// Quorum of distinct approvals reached
    Approved,
    /// At least one rejection recorded
    Rejected,
    /// Expiry passed before resolution
    Expired,
}

impl ApprovalStatus {
    /// Whether the status accepts no further transitions
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}

/// Transitions permitted from a status
#[must_use]
pub fn allowed_transitions(from: ApprovalStatus) -> Vec<ApprovalStatus> {
    use ApprovalStatus::{Approved, Expired, Pending, Rejected};
    match from {
        Pending => vec![Approved, Rejected, Expired],
        Approved | Rejected | Expired => vec![],
    }
}

/// Validate a state transition
///
/// # Errors
/// - `ApprovalError::IllegalTransition` when the state machine forbids it
pub fn validate_transition(
    from: ApprovalStatus,
    to: ApprovalStatus,
) -> Result<(), ApprovalError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ApprovalError::IllegalTransition { from, to })
    }
}

/// One approve/reject decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    /// Counts toward the quorum
    Approve,
    /// Terminal on its own
    Reject,
}

/// A recorded decision; identity is (request id, approver id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Approver (never the requester)
    pub approver_id: ActorId,
    /// Approve or reject
    pub decision: DecisionKind,
    /// Free-form reason
    pub reason: String,
    /// When the decision was recorded
    pub decided_at: DateTime<Utc>,
}

/// Default request lifetime
pub(crate) const DEFAULT_TTL_HOURS: i64 = 24;

/// One multi-party approval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request id
    pub id: RequestId,
    /// Operation the request gates
    pub operation: String,
    /// Tenant scope
    pub tenant_id: TenantId,
    /// Actor that asked to run the operation
    pub requester_id: ActorId,
    /// Operation parameters, frozen at creation
    pub parameters: Value,
    /// Requester's stated reason
    pub reason: String,
    /// Correlation id of the originating decision chain
    pub correlation_id: CorrelationId,
    /// Lifecycle status
    pub status: ApprovalStatus,
    /// Distinct approvals required for APPROVED
    pub required_approvers: u32,
    /// Recorded decisions, in arrival order
    pub decisions: Vec<ApprovalDecision>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Wall-clock expiry
    pub expires_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Create a PENDING request with the default 24h expiry
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        operation: impl Into<String>,
        tenant_id: TenantId,
        requester_id: ActorId,
        parameters: Value,
        reason: impl Into<String>,
        correlation_id: CorrelationId,
        required_approvers: u32,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: RequestId::new(),
            operation: operation.into(),
            tenant_id,
            requester_id,
            parameters,
            reason: reason.into(),
            correlation_id,
            status: ApprovalStatus::Pending,
            required_approvers,
            decisions: Vec::new(),
            created_at,
            expires_at: created_at + Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// With an explicit expiry
    #[inline]
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Whether the wall-clock expiry has passed at `now`
    #[inline]
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Count of distinct approving decisions
    #[must_use]
    pub fn approval_count(&self) -> u32 {
        let approvers: std::collections::BTreeSet<&ActorId> = self
            .decisions
            .iter()
            .filter(|d| d.decision == DecisionKind::Approve)
            .map(|d| &d.approver_id)
            .collect();
        u32::try_from(approvers.len()).unwrap_or(u32::MAX)
    }

    /// Whether this approver already recorded a decision
    #[must_use]
    pub fn has_decided(&self, approver: &ActorId) -> bool {
        self.decisions.iter().any(|d| &d.approver_id == approver)
    }
}
