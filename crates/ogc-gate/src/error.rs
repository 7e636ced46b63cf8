//! Error types for the feature gate

use ogc_audit::AuditError;
use ogc_context::ActorRole;

/// Feature-gate errors
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Flag name is not in the catalog
    #[error("unknown feature flag: {0}")]
    UnknownFlag(String),

    /// Flag is globally fixed and cannot be overridden per tenant
    #[error("feature flag is globally fixed and cannot be overridden: {0}")]
    GloballyFixed(String),

    /// Actor's role is below the flag's minimum mutation role
    #[error("role {held} is below the minimum {required} required to change this flag")]
    InsufficientRole {
        /// Minimum role configured on the flag
        required: ActorRole,
        /// Role the actor holds
        held: ActorRole,
    },

    /// Backing store failure
    #[error("flag store error: {0}")]
    Store(String),

    /// Audit write failure
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
}
