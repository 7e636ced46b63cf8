//! Testing utilities for the OGC workspace
//!
//! Shared fixtures: a fully wired guardrail stack over in-memory stores,
//! context helpers, and a recording executor.

#![allow(missing_docs)]

use async_trait::async_trait;
use ogc_approval::{ApprovalEngine, MemoryApprovalStore};
use ogc_audit::{AuditTrail, MemoryAuditSink};
use ogc_context::{ActorRole, CorrelationId, TenantContext, TenantId};
use ogc_gate::{FeatureGate, FlagStore, MemoryFlagStore};
use ogc_guardrail::{
    ExecutorError, Guardrail, GuardrailConfig, OperationExecutor, RequestGuard,
};
use ogc_registry::{OperationDefinition, OperationRegistry};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// One recorded executor invocation
#[derive(Debug, Clone)]
pub struct ExecutedCall {
    pub operation: String,
    pub tenant_id: TenantId,
    pub parameters: Value,
}

/// Executor stub that records every call
///
/// Succeeds with a fixed payload unless a failure message has been staged
/// with [`RecordingExecutor::fail_with`].
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecutedCall>>,
    failure: Mutex<Option<String>>,
}

impl RecordingExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with this message
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn calls(&self) -> Vec<ExecutedCall> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl OperationExecutor for RecordingExecutor {
    async fn execute(
        &self,
        operation: &OperationDefinition,
        parameters: &Value,
        ctx: &TenantContext,
        _correlation_id: CorrelationId,
    ) -> Result<Value, ExecutorError> {
        self.calls.lock().push(ExecutedCall {
            operation: operation.name.clone(),
            tenant_id: ctx.tenant_id.clone(),
            parameters: parameters.clone(),
        });
        match self.failure.lock().clone() {
            Some(message) => Err(ExecutorError(message)),
            None => Ok(json!({ "status": "completed" })),
        }
    }
}

/// A fully wired guardrail stack over in-memory stores
///
/// Every collaborator is exposed so tests can reach behind the orchestrator
/// (seed flag overrides, inspect the audit sink, stage executor failures).
#[derive(Debug)]
pub struct TestStack {
    pub registry: Arc<OperationRegistry>,
    pub gate: Arc<FeatureGate>,
    pub approvals: Arc<ApprovalEngine>,
    pub trail: Arc<AuditTrail>,
    pub sink: Arc<MemoryAuditSink>,
    pub flags: Arc<MemoryFlagStore>,
    pub executor: Arc<RecordingExecutor>,
    pub guardrail: Arc<Guardrail>,
}

impl TestStack {
    /// Boundary guard wrapping this stack's orchestrator
    #[must_use]
    pub fn request_guard(&self) -> RequestGuard {
        RequestGuard::new(Arc::clone(&self.guardrail))
    }

    /// Enable a flag for a tenant directly in the authoritative store
    ///
    /// Bypasses role checks; the advisory cache is flushed so the override
    /// is visible immediately.
    pub async fn enable_flag(&self, tenant: impl Into<TenantId>, flag: &str) {
        self.flags
            .set_override(&tenant.into(), flag, true)
            .await
            .unwrap();
        self.gate.invalidate_cache();
    }
}

/// Wire a stack with the builtin operation and flag catalogs
#[must_use]
pub fn test_stack() -> TestStack {
    test_stack_with_config(GuardrailConfig::default())
}

/// Wire a stack with an explicit guardrail configuration
#[must_use]
pub fn test_stack_with_config(config: GuardrailConfig) -> TestStack {
    let sink = Arc::new(MemoryAuditSink::new());
    let trail = Arc::new(AuditTrail::new(sink.clone()));
    let registry = Arc::new(OperationRegistry::with_builtin());
    let flags = Arc::new(MemoryFlagStore::new());
    let gate = Arc::new(FeatureGate::with_builtin(flags.clone(), trail.clone()));
    let approvals = Arc::new(ApprovalEngine::new(
        Arc::new(MemoryApprovalStore::new()),
        trail.clone(),
    ));
    let executor = Arc::new(RecordingExecutor::new());
    let guardrail = Arc::new(
        Guardrail::new(
            registry.clone(),
            gate.clone(),
            approvals.clone(),
            trail.clone(),
            executor.clone(),
        )
        .with_config(config),
    );
    TestStack {
        registry,
        gate,
        approvals,
        trail,
        sink,
        flags,
        executor,
        guardrail,
    }
}

/// Admin context with the given permissions
#[must_use]
pub fn admin_context<I, S>(tenant: &str, actor: &str, permissions: I) -> TenantContext
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TenantContext::new(tenant, actor, ActorRole::Admin).with_permissions(permissions)
}

/// Member context with no permissions
#[must_use]
pub fn member_context(tenant: &str, actor: &str) -> TenantContext {
    TenantContext::new(tenant, actor, ActorRole::Member)
}

/// Owner context with the given permissions
#[must_use]
pub fn owner_context<I, S>(tenant: &str, actor: &str, permissions: I) -> TenantContext
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TenantContext::new(tenant, actor, ActorRole::Owner).with_permissions(permissions)
}
