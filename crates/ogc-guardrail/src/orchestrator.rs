//! The guardrail orchestrator
//!
//! The single enforcement chokepoint. Every entry point runs the same
//! fixed pipeline, short-circuiting on the first failure:
//!
//! 1. registry lookup
//! 2. feature-gate check (only when the definition names a flag)
//! 3. permission superset check
//! 4. approval requirement check (read-only; never creates a request)
//!
//! Any internal fault at any stage converts to a `GUARDRAIL_ERROR` denial.
//! The system fails closed, never open.

use crate::config::GuardrailConfig;
use crate::error::{ExecuteError, ExecutorError, GuardrailDenied, GuardrailError};
use crate::result::{DenyReason, GuardrailResult};
use async_trait::async_trait;
use ogc_approval::{ApprovalEngine, ApprovalRequest};
use ogc_audit::{AuditTrail, EventCategory, EventOutcome, StepEvent};
use ogc_context::{CorrelationId, TenantContext};
use ogc_gate::FeatureGate;
use ogc_registry::{OperationDefinition, OperationRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

/// Opaque executor collaborator
///
/// Invoked only after every guardrail condition is satisfied; how the
/// operation is actually carried out is not this crate's concern.
#[async_trait]
pub trait OperationExecutor: Send + Sync + std::fmt::Debug {
    /// Carry out an approved operation
    ///
    /// # Errors
    /// - `ExecutorError` on failure; the outcome is audited either way
    async fn execute(
        &self,
        operation: &OperationDefinition,
        parameters: &Value,
        ctx: &TenantContext,
        correlation_id: CorrelationId,
    ) -> Result<Value, ExecutorError>;
}

/// Outcome of `execute_dangerous_operation`
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// The operation's policy requires approval; a request is now pending
    RequiresApproval {
        /// The pending request (newly created, or the one already open)
        request: ApprovalRequest,
    },
    /// The pipeline was fully satisfied and the executor ran
    Executed {
        /// The executor's result value
        result: Value,
    },
}

/// Internal pipeline outcome
enum StageOutcome {
    Denied(GuardrailResult),
    Cleared {
        def: Arc<OperationDefinition>,
        approved: Option<ApprovalRequest>,
    },
}

/// The guardrail orchestrator service
///
/// Explicitly constructed at process start with its collaborators injected;
/// there is no global instance.
#[derive(Debug)]
pub struct Guardrail {
    registry: Arc<OperationRegistry>,
    gate: Arc<FeatureGate>,
    approvals: Arc<ApprovalEngine>,
    trail: Arc<AuditTrail>,
    executor: Arc<dyn OperationExecutor>,
    config: GuardrailConfig,
}

impl Guardrail {
    /// Create an orchestrator with the default configuration
    #[must_use]
    pub fn new(
        registry: Arc<OperationRegistry>,
        gate: Arc<FeatureGate>,
        approvals: Arc<ApprovalEngine>,
        trail: Arc<AuditTrail>,
        executor: Arc<dyn OperationExecutor>,
    ) -> Self {
        Self {
            registry,
            gate,
            approvals,
            trail,
            executor,
            config: GuardrailConfig::default(),
        }
    }

    /// With an explicit configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: GuardrailConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// The shared audit trail
    #[inline]
    #[must_use]
    pub fn trail(&self) -> &Arc<AuditTrail> {
        &self.trail
    }

    /// Run the check pipeline without executing anything
    ///
    /// Read-only: never creates an approval request, even when one would be
    /// required. Internal faults come back as a `GUARDRAIL_ERROR` denial,
    /// never as an error.
    pub async fn check_operation(
        &self,
        name: &str,
        ctx: &TenantContext,
        parameters: &Value,
        correlation_id: CorrelationId,
    ) -> GuardrailResult {
        if !self.config.enforce_service {
            return self.bypass("service", name, ctx, correlation_id).await;
        }
        match self.check_stages(name, ctx, correlation_id).await {
            Ok(StageOutcome::Cleared { def, approved }) => {
                if let Err(e) = self
                    .trail
                    .track(
                        correlation_id,
                        &ctx.tenant_id,
                        &ctx.actor_id,
                        StepEvent::new(
                            "guardrail_allowed",
                            EventCategory::Guardrail,
                            EventOutcome::Success,
                        )
                        .with_resource("operation", name)
                        .with_metadata(json!({ "parameters": parameters })),
                    )
                    .await
                {
                    return self.fail_closed(name, ctx, correlation_id, e.into()).await;
                }
                let mut result = GuardrailResult::allow(def);
                if let Some(approved) = approved {
                    result = result.with_approval_request(approved.id);
                }
                result
            }
            Ok(StageOutcome::Denied(result)) => {
                self.log_denial(name, ctx, &result);
                result
            }
            Err(e) => self.fail_closed(name, ctx, correlation_id, e).await,
        }
    }

    /// Pipeline gate for background jobs
    ///
    /// # Errors
    /// - `GuardrailDenied` carrying the full result on any denial
    pub async fn require_dangerous_permission(
        &self,
        name: &str,
        ctx: &TenantContext,
        correlation_id: CorrelationId,
    ) -> Result<(), GuardrailDenied> {
        if !self.config.enforce_background {
            let _ = self.bypass("background", name, ctx, correlation_id).await;
            return Ok(());
        }
        match self.check_stages(name, ctx, correlation_id).await {
            Ok(StageOutcome::Cleared { .. }) => Ok(()),
            Ok(StageOutcome::Denied(result)) => {
                self.log_denial(name, ctx, &result);
                Err(GuardrailDenied { result })
            }
            Err(e) => Err(GuardrailDenied {
                result: self.fail_closed(name, ctx, correlation_id, e).await,
            }),
        }
    }

    /// Run the pipeline and, if fully satisfied, invoke the executor
    ///
    /// When the operation's policy requires approval and no APPROVED
    /// request covers it, this creates the approval request (or returns the
    /// one already pending) instead of executing.
    ///
    /// # Errors
    /// - `ExecuteError::Denied` on any non-approval denial
    /// - `ExecuteError::InvalidParameters` listing every violated rule
    /// - `ExecuteError::Approval` for workflow conflicts (surfaced verbatim)
    /// - `ExecuteError::Execution` when the executor itself fails
    pub async fn execute_dangerous_operation(
        &self,
        name: &str,
        ctx: &TenantContext,
        parameters: Value,
        reason: &str,
        correlation_id: CorrelationId,
    ) -> Result<ExecuteOutcome, ExecuteError> {
        if !self.config.enforce_service {
            let _ = self.bypass("service", name, ctx, correlation_id).await;
            let Some(def) = self.registry.lookup(name) else {
                return Err(GuardrailDenied {
                    result: GuardrailResult::deny(
                        DenyReason::UnregisteredOperation,
                        format!("operation is not registered: {name}"),
                    ),
                }
                .into());
            };
            return self
                .invoke_executor(def, parameters, ctx, correlation_id, None)
                .await;
        }

        match self.check_stages(name, ctx, correlation_id).await {
            Err(e) => Err(GuardrailDenied {
                result: self.fail_closed(name, ctx, correlation_id, e).await,
            }
            .into()),
            Ok(StageOutcome::Denied(result)) => {
                if result.error_type == Some(DenyReason::ApprovalRequired) {
                    self.request_approval(name, ctx, parameters, reason, correlation_id, result)
                        .await
                } else {
                    self.log_denial(name, ctx, &result);
                    Err(GuardrailDenied { result }.into())
                }
            }
            Ok(StageOutcome::Cleared { def, approved }) => {
                self.validate_parameters(name, ctx, &parameters, reason, correlation_id)
                    .await?;
                self.invoke_executor(def, parameters, ctx, correlation_id, approved)
                    .await
            }
        }
    }

    /// The fixed, short-circuiting check pipeline
    async fn check_stages(
        &self,
        name: &str,
        ctx: &TenantContext,
        correlation_id: CorrelationId,
    ) -> Result<StageOutcome, GuardrailError> {
        // Stage 1: registry lookup.
        let Some(def) = self.registry.lookup(name) else {
            self.track_stage(
                correlation_id,
                ctx,
                "registry_lookup",
                name,
                EventOutcome::Denied,
                json!({ "reason": DenyReason::UnregisteredOperation }),
            )
            .await?;
            return Ok(StageOutcome::Denied(GuardrailResult::deny(
                DenyReason::UnregisteredOperation,
                format!("operation is not registered: {name}"),
            )));
        };
        self.track_stage(
            correlation_id,
            ctx,
            "registry_lookup",
            name,
            EventOutcome::Success,
            json!({ "risk": def.risk, "policy": def.policy }),
        )
        .await?;

        // Stage 2: feature gate, only when the definition names a flag.
        if let Some(flag) = &def.feature_flag {
            let check = self.gate.is_enabled(flag, ctx).await?;
            if !check.enabled {
                self.track_stage(
                    correlation_id,
                    ctx,
                    "feature_gate_check",
                    name,
                    EventOutcome::Denied,
                    json!({ "flag": flag, "source": check.source, "cached": check.cached }),
                )
                .await?;
                return Ok(StageOutcome::Denied(
                    GuardrailResult::deny(
                        DenyReason::FeatureFlagDisabled,
                        format!("feature flag {flag} is not enabled for this tenant"),
                    )
                    .with_operation(def.clone())
                    .with_required_flag(flag.clone()),
                ));
            }
            self.track_stage(
                correlation_id,
                ctx,
                "feature_gate_check",
                name,
                EventOutcome::Success,
                json!({ "flag": flag, "source": check.source, "cached": check.cached }),
            )
            .await?;
        }

        // Stage 3: permission superset check.
        let missing = ctx.missing_permissions(&def.required_permissions);
        if !missing.is_empty() {
            self.track_stage(
                correlation_id,
                ctx,
                "permission_check",
                name,
                EventOutcome::Denied,
                json!({ "missing": missing }),
            )
            .await?;
            return Ok(StageOutcome::Denied(
                GuardrailResult::deny(
                    DenyReason::InsufficientPermissions,
                    format!("missing required permissions: {}", missing.join(", ")),
                )
                .with_operation(def.clone())
                .with_missing_permissions(missing),
            ));
        }
        self.track_stage(
            correlation_id,
            ctx,
            "permission_check",
            name,
            EventOutcome::Success,
            json!({ "required": def.required_permissions }),
        )
        .await?;

        // Stage 4: approval requirement. Read-only; the request is only
        // ever created by the execute path.
        if def.policy.requires_approval() {
            if let Some(approved) = self
                .approvals
                .find_approved(&def.name, &ctx.tenant_id)
                .await?
            {
                self.track_stage(
                    correlation_id,
                    ctx,
                    "approval_check",
                    name,
                    EventOutcome::Success,
                    json!({ "approved_request": approved.id }),
                )
                .await?;
                return Ok(StageOutcome::Cleared {
                    def,
                    approved: Some(approved),
                });
            }

            let pending = self.approvals.find_pending(&def.name, &ctx.tenant_id).await?;
            self.track_stage(
                correlation_id,
                ctx,
                "approval_check",
                name,
                EventOutcome::Denied,
                json!({ "pending_request": pending.as_ref().map(|p| p.id) }),
            )
            .await?;
            let mut result = GuardrailResult::deny(
                DenyReason::ApprovalRequired,
                format!(
                    "operation requires {} distinct approvals",
                    def.policy.required_approvers()
                ),
            )
            .with_operation(def);
            if let Some(pending) = pending {
                result = result.with_approval_request(pending.id);
            }
            return Ok(StageOutcome::Denied(result));
        }

        Ok(StageOutcome::Cleared {
            def,
            approved: None,
        })
    }

    /// Validate parameters, reporting every violated rule at once
    async fn validate_parameters(
        &self,
        name: &str,
        ctx: &TenantContext,
        parameters: &Value,
        reason: &str,
        correlation_id: CorrelationId,
    ) -> Result<(), ExecuteError> {
        let outcome = match self.registry.validate(
            name,
            &ctx.tenant_id,
            &ctx.actor_id,
            parameters,
            reason,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(GuardrailDenied {
                    result: self.fail_closed(name, ctx, correlation_id, e.into()).await,
                }
                .into());
            }
        };
        if outcome.valid {
            return Ok(());
        }

        self.track_soft(
            correlation_id,
            ctx,
            StepEvent::new(
                "parameter_validation",
                EventCategory::Validation,
                EventOutcome::Denied,
            )
            .with_resource("operation", name)
            .with_metadata(json!({ "errors": outcome.errors })),
        )
        .await;
        Err(ExecuteError::InvalidParameters {
            errors: outcome.errors,
        })
    }

    /// Approval-required path of the execute entry point
    async fn request_approval(
        &self,
        name: &str,
        ctx: &TenantContext,
        parameters: Value,
        reason: &str,
        correlation_id: CorrelationId,
        denial: GuardrailResult,
    ) -> Result<ExecuteOutcome, ExecuteError> {
        // Parameters must be valid before they are frozen into a request.
        self.validate_parameters(name, ctx, &parameters, reason, correlation_id)
            .await?;

        let Some(def) = denial.operation.clone() else {
            // The approval denial always carries the definition; treat its
            // absence as an internal fault.
            return Err(GuardrailDenied { result: denial }.into());
        };

        if let Some(pending_id) = denial.approval_request_id {
            if let Some(pending) = self
                .approvals
                .get(pending_id)
                .await
                .ok()
                .flatten()
                .filter(|r| r.status == ogc_approval::ApprovalStatus::Pending)
            {
                return Ok(ExecuteOutcome::RequiresApproval { request: pending });
            }
        }

        let request = self
            .approvals
            .create(&def, ctx, parameters, reason, correlation_id)
            .await?;
        Ok(ExecuteOutcome::RequiresApproval { request })
    }

    /// Invoke the opaque executor and audit the outcome
    async fn invoke_executor(
        &self,
        def: Arc<OperationDefinition>,
        parameters: Value,
        ctx: &TenantContext,
        correlation_id: CorrelationId,
        approved: Option<ApprovalRequest>,
    ) -> Result<ExecuteOutcome, ExecuteError> {
        tracing::info!(
            operation = %def.name,
            tenant = %ctx.tenant_id,
            actor = %ctx.actor_id,
            "guardrail satisfied; invoking executor"
        );
        let approved_id = approved.map(|r| r.id);
        match self
            .executor
            .execute(&def, &parameters, ctx, correlation_id)
            .await
        {
            Ok(result) => {
                self.track_soft(
                    correlation_id,
                    ctx,
                    StepEvent::new(
                        "operation_executed",
                        EventCategory::Execution,
                        EventOutcome::Success,
                    )
                    .with_resource("operation", def.name.clone())
                    .with_metadata(json!({ "approved_request": approved_id })),
                )
                .await;
                Ok(ExecuteOutcome::Executed { result })
            }
            Err(e) => {
                self.track_soft(
                    correlation_id,
                    ctx,
                    StepEvent::new(
                        "operation_executed",
                        EventCategory::Execution,
                        EventOutcome::Failure,
                    )
                    .with_resource("operation", def.name.clone())
                    .with_metadata(json!({ "error": e.to_string() })),
                )
                .await;
                Err(e.into())
            }
        }
    }

    /// Convert an internal fault into a fail-closed denial
    async fn fail_closed(
        &self,
        name: &str,
        ctx: &TenantContext,
        correlation_id: CorrelationId,
        err: GuardrailError,
    ) -> GuardrailResult {
        tracing::error!(
            operation = name,
            tenant = %ctx.tenant_id,
            error = %err,
            "guardrail pipeline fault; denying fail-closed"
        );
        // Full detail always reaches the audit trail, sanitized or not.
        self.track_soft(
            correlation_id,
            ctx,
            StepEvent::new(
                "guardrail_error",
                EventCategory::Guardrail,
                EventOutcome::Failure,
            )
            .with_resource("operation", name)
            .with_metadata(json!({ "error": err.to_string() })),
        )
        .await;

        let message = if self.config.sanitize_errors {
            "internal guardrail error".to_string()
        } else {
            err.to_string()
        };
        GuardrailResult::deny(DenyReason::GuardrailError, message)
    }

    /// Allow-without-checks path for a disabled enforcement layer
    async fn bypass(
        &self,
        layer: &str,
        name: &str,
        ctx: &TenantContext,
        correlation_id: CorrelationId,
    ) -> GuardrailResult {
        tracing::warn!(
            layer,
            operation = name,
            tenant = %ctx.tenant_id,
            "guardrail enforcement disabled; allowing without checks"
        );
        self.track_soft(
            correlation_id,
            ctx,
            StepEvent::new(
                "enforcement_bypassed",
                EventCategory::Guardrail,
                EventOutcome::Success,
            )
            .with_resource("operation", name)
            .with_metadata(json!({ "layer": layer })),
        )
        .await;
        GuardrailResult::bypassed(layer)
    }

    async fn track_stage(
        &self,
        correlation_id: CorrelationId,
        ctx: &TenantContext,
        stage: &str,
        operation: &str,
        outcome: EventOutcome,
        metadata: Value,
    ) -> Result<(), GuardrailError> {
        self.trail
            .track(
                correlation_id,
                &ctx.tenant_id,
                &ctx.actor_id,
                StepEvent::new(stage, EventCategory::Guardrail, outcome)
                    .with_resource("operation", operation)
                    .with_metadata(metadata),
            )
            .await?;
        Ok(())
    }

    /// Audit write on a path that must not turn into a second fault
    async fn track_soft(&self, correlation_id: CorrelationId, ctx: &TenantContext, event: StepEvent) {
        if let Err(e) = self
            .trail
            .track(correlation_id, &ctx.tenant_id, &ctx.actor_id, event)
            .await
        {
            tracing::error!(error = %e, "audit write failed on a denial path");
        }
    }

    fn log_denial(&self, name: &str, ctx: &TenantContext, result: &GuardrailResult) {
        if self.config.log_failures_as_security {
            tracing::warn!(
                target: "ogc::security",
                operation = name,
                tenant = %ctx.tenant_id,
                actor = %ctx.actor_id,
                reason = %result.reason,
                "dangerous operation denied"
            );
        } else {
            tracing::info!(
                operation = name,
                tenant = %ctx.tenant_id,
                reason = %result.reason,
                "dangerous operation denied"
            );
        }
    }
}
