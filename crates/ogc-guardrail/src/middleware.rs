//! Request-boundary adapter
//!
//! Framework-neutral guard for HTTP-style entry points: callers hand in the
//! operation name and whatever tenant context the transport layer resolved,
//! and get back a verdict with the status code and body shape already
//! decided. A missing context is rejected before the pipeline ever runs.

use crate::orchestrator::Guardrail;
use crate::result::{DenyReason, GuardrailResult};
use ogc_approval::RequestId;
use ogc_audit::{EventCategory, EventOutcome, StepEvent};
use ogc_context::{ActorId, CorrelationId, TenantContext, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Tenant the boundary charges unauthenticated denials to
const SYSTEM_TENANT: &str = "system";
/// Actor recorded when no identity reached the boundary
const UNAUTHENTICATED_ACTOR: &str = "unauthenticated";

/// Serializable denial body for transport responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenialBody {
    /// Machine-readable code from the denial taxonomy
    pub error: String,
    /// Human-readable detail, already sanitized
    pub message: String,
    /// Whether creating an approval request would unblock the caller
    pub requires_approval: bool,
    /// Pending or approved request relevant to the decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl DenialBody {
    fn from_result(result: &GuardrailResult) -> Self {
        Self {
            error: result.reason.clone(),
            message: result.message.clone(),
            requires_approval: result.error_type == Some(DenyReason::ApprovalRequired),
            request_id: result.approval_request_id,
        }
    }
}

/// Verdict the transport layer maps onto a response
#[derive(Debug)]
pub enum GuardVerdict {
    /// Proceed with the request; the handler may inspect the result
    Allowed(GuardrailResult),
    /// Reject with the given body
    Denied(DenialBody),
    /// Reject: no tenant context reached the boundary
    MissingContext(DenialBody),
}

impl GuardVerdict {
    /// The HTTP status code this verdict maps to
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Allowed(_) => 200,
            Self::Denied(_) => 403,
            Self::MissingContext(_) => 401,
        }
    }

    /// Whether the request may proceed
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }
}

/// Boundary guard wrapping the orchestrator
#[derive(Debug, Clone)]
pub struct RequestGuard {
    guardrail: Arc<Guardrail>,
}

impl RequestGuard {
    /// Wrap an orchestrator
    #[inline]
    #[must_use]
    pub fn new(guardrail: Arc<Guardrail>) -> Self {
        Self { guardrail }
    }

    /// Evaluate a request against the guardrail pipeline
    ///
    /// `ctx` is `None` when the transport layer could not resolve a tenant
    /// context; that is a 401 before any pipeline stage runs. The denial is
    /// still recorded in the audit trail, attributed to the system scope so
    /// unauthenticated probing of dangerous operations stays visible there.
    pub async fn guard(
        &self,
        operation: &str,
        ctx: Option<&TenantContext>,
        parameters: &Value,
        correlation_id: CorrelationId,
    ) -> GuardVerdict {
        let Some(ctx) = ctx else {
            tracing::warn!(
                operation,
                correlation_id = %correlation_id,
                "request reached guardrail boundary without tenant context"
            );
            let result = GuardrailResult::deny(
                DenyReason::MissingTenantContext,
                "request is missing tenant context",
            );
            let event = StepEvent::new(
                "boundary_rejected",
                EventCategory::Guardrail,
                EventOutcome::Denied,
            )
            .with_resource("operation", operation)
            .with_metadata(json!({ "reason": result.reason }));
            if let Err(e) = self
                .guardrail
                .trail()
                .track(
                    correlation_id,
                    &TenantId::new(SYSTEM_TENANT),
                    &ActorId::new(UNAUTHENTICATED_ACTOR),
                    event,
                )
                .await
            {
                tracing::error!(error = %e, "audit write failed on a denial path");
            }
            return GuardVerdict::MissingContext(DenialBody::from_result(&result));
        };

        if !self.guardrail.config().enforce_api {
            // Service-level enforcement still applies inside the handler;
            // only the boundary check is skipped.
            tracing::warn!(operation, "api enforcement disabled; skipping boundary check");
            return GuardVerdict::Allowed(GuardrailResult::bypassed("api"));
        }

        let result = self
            .guardrail
            .check_operation(operation, ctx, parameters, correlation_id)
            .await;
        if result.allowed {
            GuardVerdict::Allowed(result)
        } else {
            GuardVerdict::Denied(DenialBody::from_result(&result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let body = DenialBody {
            error: "APPROVAL_REQUIRED".to_string(),
            message: "approval required".to_string(),
            requires_approval: true,
            request_id: None,
        };
        assert_eq!(GuardVerdict::Denied(body.clone()).status_code(), 403);
        assert_eq!(GuardVerdict::MissingContext(body).status_code(), 401);
    }

    #[test]
    fn denial_body_marks_approval_denials() {
        let result = GuardrailResult::deny(DenyReason::ApprovalRequired, "approval required");
        let body = DenialBody::from_result(&result);
        assert!(body.requires_approval);
        assert_eq!(body.error, "APPROVAL_REQUIRED");

        let result = GuardrailResult::deny(DenyReason::FeatureFlagDisabled, "flag is off");
        assert!(!DenialBody::from_result(&result).requires_approval);
    }

    #[test]
    fn request_id_is_omitted_from_json_when_absent() {
        let result = GuardrailResult::deny(DenyReason::ApprovalRequired, "approval required");
        let json = serde_json::to_value(DenialBody::from_result(&result)).unwrap();
        assert!(json.get("request_id").is_none());
    }
}
