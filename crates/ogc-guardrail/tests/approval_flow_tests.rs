//! The full approve-then-execute lifecycle through the orchestrator:
//! request creation, quorum, rejection, expiry reuse, tenant isolation,
//! and the boundary guard's view of it all.

use ogc_approval::{ApprovalError, ApprovalStatus, DecisionInput};
use ogc_context::CorrelationId;
use ogc_guardrail::{DenyReason, ExecuteError, ExecuteOutcome};
use ogc_test_utils::{admin_context, test_stack, TestStack};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Stack with the dangerous-operations flag enabled for t1
async fn armed_stack() -> TestStack {
    let stack = test_stack();
    stack.enable_flag("t1", "DANGEROUS_OPERATIONS").await;
    stack
}

fn deletion_params() -> Value {
    json!({"confirmation": "t1"})
}

const DELETION_REASON: &str = "customer requested account closure";

#[tokio::test]
async fn execute_creates_a_pending_request_instead_of_running() {
    let stack = armed_stack().await;
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);

    let outcome = stack
        .guardrail
        .execute_dangerous_operation(
            "TENANT_DELETION",
            &ctx,
            deletion_params(),
            DELETION_REASON,
            CorrelationId::new(),
        )
        .await
        .unwrap();

    let request = match outcome {
        ExecuteOutcome::RequiresApproval { request } => request,
        other => panic!("expected pending approval, got {other:?}"),
    };
    assert_eq!(request.status, ApprovalStatus::Pending);
    assert_eq!(request.required_approvers, 2);
    assert_eq!(request.operation, "TENANT_DELETION");
    assert_eq!(request.parameters, deletion_params());
    assert_eq!(stack.executor.call_count(), 0);
}

#[tokio::test]
async fn re_execute_returns_the_existing_pending_request() {
    let stack = armed_stack().await;
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);

    let first = execute_expecting_pending(&stack, &ctx).await;
    let second = execute_expecting_pending(&stack, &ctx).await;

    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn check_surfaces_the_pending_request_id() {
    let stack = armed_stack().await;
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);
    let pending = execute_expecting_pending(&stack, &ctx).await;

    let result = stack
        .guardrail
        .check_operation("TENANT_DELETION", &ctx, &deletion_params(), CorrelationId::new())
        .await;

    assert_eq!(result.error_type, Some(DenyReason::ApprovalRequired));
    assert_eq!(result.approval_request_id, Some(pending.id));
}

#[tokio::test]
async fn quorum_flow_approves_then_executes() {
    let stack = armed_stack().await;
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);
    let pending = execute_expecting_pending(&stack, &ctx).await;

    // Requester cannot approve their own request.
    let err = stack
        .approvals
        .decide(DecisionInput::approve(
            pending.id,
            "alice",
            "looks right",
            CorrelationId::new(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::SelfApproval));

    // First of two approvals: still pending.
    let after_one = stack
        .approvals
        .decide(DecisionInput::approve(
            pending.id,
            "bob",
            "verified ticket",
            CorrelationId::new(),
        ))
        .await
        .unwrap();
    assert_eq!(after_one.status, ApprovalStatus::Pending);

    // Same approver again does not advance the count.
    let err = stack
        .approvals
        .decide(DecisionInput::approve(
            pending.id,
            "bob",
            "again",
            CorrelationId::new(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::DuplicateDecision { .. }));

    // Second distinct approver reaches quorum.
    let approved = stack
        .approvals
        .decide(DecisionInput::approve(
            pending.id,
            "carol",
            "verified ticket",
            CorrelationId::new(),
        ))
        .await
        .unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);

    // Execution now proceeds.
    let outcome = stack
        .guardrail
        .execute_dangerous_operation(
            "TENANT_DELETION",
            &ctx,
            deletion_params(),
            DELETION_REASON,
            CorrelationId::new(),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, ExecuteOutcome::Executed { .. }));
    assert_eq!(stack.executor.call_count(), 1);
    let call = &stack.executor.calls()[0];
    assert_eq!(call.operation, "TENANT_DELETION");
    assert_eq!(call.parameters, deletion_params());
}

#[tokio::test]
async fn approved_request_is_reusable_until_it_expires() {
    let stack = armed_stack().await;
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);
    approve_deletion(&stack, &ctx).await;

    for _ in 0..2 {
        let outcome = stack
            .guardrail
            .execute_dangerous_operation(
                "TENANT_DELETION",
                &ctx,
                deletion_params(),
                DELETION_REASON,
                CorrelationId::new(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, ExecuteOutcome::Executed { .. }));
    }
    assert_eq!(stack.executor.call_count(), 2);
}

#[tokio::test]
async fn approval_is_tenant_scoped() {
    let stack = armed_stack().await;
    stack.enable_flag("t2", "DANGEROUS_OPERATIONS").await;
    let t1 = admin_context("t1", "alice", ["tenant:delete"]);
    approve_deletion(&stack, &t1).await;

    // The t1 approval clears nothing for t2.
    let t2 = admin_context("t2", "alice", ["tenant:delete"]);
    let result = stack
        .guardrail
        .check_operation(
            "TENANT_DELETION",
            &t2,
            &json!({"confirmation": "t2"}),
            CorrelationId::new(),
        )
        .await;
    assert_eq!(result.error_type, Some(DenyReason::ApprovalRequired));
}

#[tokio::test]
async fn rejection_is_terminal_and_a_new_request_can_follow() {
    let stack = armed_stack().await;
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);
    let pending = execute_expecting_pending(&stack, &ctx).await;

    let rejected = stack
        .approvals
        .decide(DecisionInput::reject(
            pending.id,
            "bob",
            "ticket does not check out",
            CorrelationId::new(),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);

    // A further decision on the resolved request is refused.
    let err = stack
        .approvals
        .decide(DecisionInput::approve(
            pending.id,
            "carol",
            "late",
            CorrelationId::new(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::AlreadyResolved { .. }));

    // The slot is free again; a new request gets a new id.
    let fresh = execute_expecting_pending(&stack, &ctx).await;
    assert_ne!(fresh.id, pending.id);
    assert_eq!(fresh.status, ApprovalStatus::Pending);
}

#[tokio::test]
async fn invalid_parameters_are_reported_before_any_request_is_created() {
    let stack = armed_stack().await;
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);

    let err = stack
        .guardrail
        .execute_dangerous_operation(
            "TENANT_DELETION",
            &ctx,
            json!({"confirmation": "wrong-tenant"}),
            "no",
            CorrelationId::new(),
        )
        .await
        .unwrap_err();

    match err {
        ExecuteError::InvalidParameters { errors } => {
            // Confirmation mismatch and short reason, both reported.
            assert_eq!(errors.len(), 2);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    let pending = stack
        .approvals
        .find_pending("TENANT_DELETION", &"t1".into())
        .await
        .unwrap();
    assert!(pending.is_none());
}

#[tokio::test]
async fn executor_failure_surfaces_and_is_audited() {
    let stack = armed_stack().await;
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);
    approve_deletion(&stack, &ctx).await;
    stack.executor.fail_with("downstream deletion service unavailable");

    let correlation = CorrelationId::new();
    let err = stack
        .guardrail
        .execute_dangerous_operation(
            "TENANT_DELETION",
            &ctx,
            deletion_params(),
            DELETION_REASON,
            correlation,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExecuteError::Execution(_)));
    let records = stack.sink.records_for(correlation);
    assert!(records
        .iter()
        .any(|r| r.action == "operation_executed"
            && r.metadata["error"]
                .as_str()
                .is_some_and(|m| m.contains("unavailable"))));
}

#[tokio::test]
async fn request_guard_walks_the_whole_flow() {
    let stack = armed_stack().await;
    let guard = stack.request_guard();
    let ctx = admin_context("t1", "alice", ["tenant:delete"]);

    // No context: 401 before the pipeline runs.
    let verdict = guard
        .guard("TENANT_DELETION", None, &deletion_params(), CorrelationId::new())
        .await;
    assert_eq!(verdict.status_code(), 401);

    // Pending approval: 403 with the request id for self-service.
    let pending = execute_expecting_pending(&stack, &ctx).await;
    let verdict = guard
        .guard(
            "TENANT_DELETION",
            Some(&ctx),
            &deletion_params(),
            CorrelationId::new(),
        )
        .await;
    assert_eq!(verdict.status_code(), 403);
    match verdict {
        ogc_guardrail::GuardVerdict::Denied(body) => {
            assert_eq!(body.error, "APPROVAL_REQUIRED");
            assert!(body.requires_approval);
            assert_eq!(body.request_id, Some(pending.id));
        }
        other => panic!("expected denial, got {other:?}"),
    }

    // Quorum reached: the guard lets the request through.
    for approver in ["bob", "carol"] {
        stack
            .approvals
            .decide(DecisionInput::approve(
                pending.id,
                approver,
                "verified",
                CorrelationId::new(),
            ))
            .await
            .unwrap();
    }
    let verdict = guard
        .guard(
            "TENANT_DELETION",
            Some(&ctx),
            &deletion_params(),
            CorrelationId::new(),
        )
        .await;
    assert_eq!(verdict.status_code(), 200);
    assert!(verdict.is_allowed());
}

async fn execute_expecting_pending(
    stack: &TestStack,
    ctx: &ogc_context::TenantContext,
) -> ogc_approval::ApprovalRequest {
    let outcome = stack
        .guardrail
        .execute_dangerous_operation(
            "TENANT_DELETION",
            ctx,
            deletion_params(),
            DELETION_REASON,
            CorrelationId::new(),
        )
        .await
        .unwrap();
    match outcome {
        ExecuteOutcome::RequiresApproval { request } => request,
        other => panic!("expected pending approval, got {other:?}"),
    }
}

async fn approve_deletion(stack: &TestStack, ctx: &ogc_context::TenantContext) {
    let pending = execute_expecting_pending(stack, ctx).await;
    for approver in ["bob", "carol"] {
        stack
            .approvals
            .decide(DecisionInput::approve(
                pending.id,
                approver,
                "verified",
                CorrelationId::new(),
            ))
            .await
            .unwrap();
    }
}
