//! OGC Guardrail - Fail-closed orchestration of dangerous operations
//!
//! The single chokepoint every dangerous operation passes through. A fixed
//! pipeline runs registry lookup, feature gating, permission checks, and
//! approval verification in order, short-circuiting on the first failure,
//! and converts any internal fault into a denial rather than letting an
//! operation slip through:
//! - [`Guardrail`]: the orchestrator with its collaborators injected
//! - [`RequestGuard`]: a framework-neutral boundary adapter
//! - [`GuardrailResult`]: the decision value handed back to callers
//!
//! Enforcement layers (api, service, background) can be toggled
//! independently for staged rollouts; a disabled layer is audited on every
//! bypass, never silent.

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod result;

pub use config::GuardrailConfig;
pub use error::{ExecuteError, ExecutorError, GuardrailDenied, GuardrailError};
pub use middleware::{DenialBody, GuardVerdict, RequestGuard};
pub use orchestrator::{ExecuteOutcome, Guardrail, OperationExecutor};
pub use result::{DenyReason, GuardrailResult};

/// Commonly used items
pub mod prelude {
    pub use crate::config::GuardrailConfig;
    pub use crate::error::{ExecuteError, GuardrailDenied};
    pub use crate::middleware::{GuardVerdict, RequestGuard};
    pub use crate::orchestrator::{ExecuteOutcome, Guardrail, OperationExecutor};
    pub use crate::result::{DenyReason, GuardrailResult};
    pub use ogc_approval::{ApprovalEngine, ApprovalStatus, DecisionInput};
    pub use ogc_audit::{AuditTrail, MemoryAuditSink};
    pub use ogc_context::{ActorRole, CorrelationId, TenantContext, TenantId};
    pub use ogc_gate::{FeatureGate, MemoryFlagStore};
    pub use ogc_registry::OperationRegistry;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
