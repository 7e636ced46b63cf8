//! Guardrail decision values
//!
//! A [`GuardrailResult`] is a value object, not persisted state: the audit
//! trail records the decision, the result just carries it to the caller
//! with enough context to self-serve the next step.

use ogc_approval::RequestId;
use ogc_registry::OperationDefinition;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Machine-readable denial taxonomy
///
/// Wire codes are the SCREAMING_SNAKE serde names. Every ambiguous or
/// erroring state maps to one of these; there is no silent-allow path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    /// Operation name is not in the registry
    UnregisteredOperation,
    /// The operation's gating flag is not enabled for the tenant
    FeatureFlagDisabled,
    /// Actor lacks one or more required permissions
    InsufficientPermissions,
    /// No resolved APPROVED request covers this (operation, tenant)
    ApprovalRequired,
    /// No tenant/actor context reached the boundary
    MissingTenantContext,
    /// Internal fault, converted fail-closed
    GuardrailError,
}

impl DenyReason {
    /// The stable wire code
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::UnregisteredOperation => "UNREGISTERED_OPERATION",
            Self::FeatureFlagDisabled => "FEATURE_FLAG_DISABLED",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::ApprovalRequired => "APPROVAL_REQUIRED",
            Self::MissingTenantContext => "MISSING_TENANT_CONTEXT",
            Self::GuardrailError => "GUARDRAIL_ERROR",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of one guardrail evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailResult {
    /// Whether the operation may proceed
    pub allowed: bool,
    /// Machine-readable reason code (`ALLOWED`, or a [`DenyReason`] code)
    pub reason: String,
    /// Human-readable detail, sanitized for external consumers
    pub message: String,
    /// Denial taxonomy tag, absent on allow
    pub error_type: Option<DenyReason>,
    /// The matched definition, when lookup succeeded
    pub operation: Option<Arc<OperationDefinition>>,
    /// Approval request relevant to the decision (approved or pending)
    pub approval_request_id: Option<RequestId>,
    /// Flag the caller must enable before retrying
    pub required_feature_flag: Option<String>,
    /// Permissions the actor is missing
    pub missing_permissions: Option<Vec<String>>,
}

impl GuardrailResult {
    /// An allow decision for a matched operation
    #[must_use]
    pub fn allow(operation: Arc<OperationDefinition>) -> Self {
        Self {
            allowed: true,
            reason: "ALLOWED".to_string(),
            message: "all guardrail checks passed".to_string(),
            error_type: None,
            operation: Some(operation),
            approval_request_id: None,
            required_feature_flag: None,
            missing_permissions: None,
        }
    }

    /// A denial with the given taxonomy tag
    #[must_use]
    pub fn deny(reason: DenyReason, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.code().to_string(),
            message: message.into(),
            error_type: Some(reason),
            operation: None,
            approval_request_id: None,
            required_feature_flag: None,
            missing_permissions: None,
        }
    }

    /// An allow decision recorded when an enforcement layer is disabled
    #[must_use]
    pub fn bypassed(layer: &str) -> Self {
        Self {
            allowed: true,
            reason: "ENFORCEMENT_DISABLED".to_string(),
            message: format!("{layer} enforcement is disabled by configuration"),
            error_type: None,
            operation: None,
            approval_request_id: None,
            required_feature_flag: None,
            missing_permissions: None,
        }
    }

    /// With the matched definition attached
    #[inline]
    #[must_use]
    pub fn with_operation(mut self, operation: Arc<OperationDefinition>) -> Self {
        self.operation = Some(operation);
        self
    }

    /// With a relevant approval request id
    #[inline]
    #[must_use]
    pub fn with_approval_request(mut self, id: RequestId) -> Self {
        self.approval_request_id = Some(id);
        self
    }

    /// With the flag the caller must enable
    #[inline]
    #[must_use]
    pub fn with_required_flag(mut self, flag: impl Into<String>) -> Self {
        self.required_feature_flag = Some(flag.into());
        self
    }

    /// With the permissions the actor is missing
    #[inline]
    #[must_use]
    pub fn with_missing_permissions(mut self, missing: Vec<String>) -> Self {
        self.missing_permissions = Some(missing);
        self
    }
}
