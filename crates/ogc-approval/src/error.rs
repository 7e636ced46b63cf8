//! Error types for the approval engine
//!
//! These are expected, recoverable workflow conditions; their messages are
//! surfaced verbatim to callers, unlike internal guardrail faults which get
//! sanitized upstream.

use crate::request::{ApprovalStatus, RequestId};
use ogc_audit::AuditError;
use ogc_context::ActorId;

/// Approval workflow errors
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A PENDING request already exists for the (operation, tenant) pair
    #[error("Pending approval request already exists")]
    PendingExists {
        /// Id of the existing PENDING request
        existing: RequestId,
    },

    /// Request id is unknown
    #[error("Approval request not found")]
    NotFound(RequestId),

    /// Approver is the requester
    #[error("Self-approval is not allowed")]
    SelfApproval,

    /// Request expiry has passed
    #[error("Approval request has expired")]
    Expired(RequestId),

    /// Request is already in a terminal state
    #[error("Approval request is not pending (status: {status})")]
    AlreadyResolved {
        /// Terminal status the request holds
        status: ApprovalStatus,
    },

    /// The approver already recorded a decision on this request
    #[error("Approver {approver} has already decided on this request")]
    DuplicateDecision {
        /// Approver that decided earlier
        approver: ActorId,
    },

    /// The operation's policy requires no approval
    #[error("Operation {0} does not require approval")]
    NoApprovalRequired(String),

    /// Transition not permitted by the state machine
    #[error("illegal approval transition: {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: ApprovalStatus,
        /// Attempted status
        to: ApprovalStatus,
    },

    /// Backing store failure
    #[error("approval store error: {0}")]
    Store(String),

    /// Audit write failure
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
}
