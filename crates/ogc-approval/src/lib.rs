//! OGC Approval - Multi-party approval workflow engine
//!
//! Tracks approval requests for (operation, tenant, requester) through the
//! PENDING → {APPROVED, REJECTED, EXPIRED} state machine:
//! - At most one PENDING request per (operation, tenant) pair, enforced by
//!   an atomic check-and-insert in the store
//! - Quorum of distinct, non-requester approvals; one rejection is terminal
//! - Wall-clock expiry, checked lazily on access and by a periodic sweep
//! - One audit record per transition
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = ApprovalEngine::new(store, trail);
//! let request = engine.create(&op, &ctx, params, "cleanup", correlation).await?;
//! engine.decide(DecisionInput::approve(request.id, "admin-2", "looks right", correlation)).await?;
//! ```

#![warn(unreachable_pub)]

pub mod engine;
pub mod error;
pub mod request;
pub mod store;

pub use engine::{ApprovalEngine, DecisionInput};
pub use error::ApprovalError;
pub use request::{
    allowed_transitions, validate_transition, ApprovalDecision, ApprovalRequest, ApprovalStatus,
    DecisionKind, RequestId,
};
pub use store::{ApprovalStore, MemoryApprovalStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
