//! Error types for the guardrail orchestrator
//!
//! Internal faults ([`GuardrailError`]) never escape to callers as errors;
//! the orchestrator converts them into fail-closed denials. What callers do
//! see are typed denials and the expected, recoverable workflow errors.

use crate::result::GuardrailResult;
use ogc_approval::ApprovalError;
use ogc_audit::AuditError;
use ogc_gate::GateError;
use ogc_registry::RegistryError;

/// Internal pipeline faults, always converted to a `GUARDRAIL_ERROR` denial
#[derive(Debug, thiserror::Error)]
pub enum GuardrailError {
    /// Feature-gate collaborator failed
    #[error("feature gate failure: {0}")]
    Gate(#[from] GateError),

    /// Approval collaborator failed on a read path
    #[error("approval engine failure: {0}")]
    Approval(#[from] ApprovalError),

    /// Registry failure
    #[error("registry failure: {0}")]
    Registry(#[from] RegistryError),

    /// Audit trail write failed; with audit down the system denies
    #[error("audit trail failure: {0}")]
    Audit(#[from] AuditError),
}

/// A typed denial carrying the full guardrail result
#[derive(Debug, thiserror::Error)]
#[error("operation denied: {}", result.reason)]
pub struct GuardrailDenied {
    /// The denial the pipeline produced
    pub result: GuardrailResult,
}

/// Executor collaborator failure
#[derive(Debug, thiserror::Error)]
#[error("executor failure: {0}")]
pub struct ExecutorError(pub String);

/// Errors from `execute_dangerous_operation`
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// The pipeline denied the operation
    #[error(transparent)]
    Denied(#[from] GuardrailDenied),

    /// Parameter validation failed; every violation is listed
    #[error("invalid parameters: {}", errors.join("; "))]
    InvalidParameters {
        /// All violated rules
        errors: Vec<String>,
    },

    /// Approval workflow error (expected, surfaced verbatim)
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// The executor itself failed after the pipeline cleared
    #[error(transparent)]
    Execution(#[from] ExecutorError),
}
