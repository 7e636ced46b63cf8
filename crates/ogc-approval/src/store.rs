//! Approval request store
//!
//! Both mutual-exclusion invariants of the workflow live here:
//! `insert_pending` is an atomic check-and-insert on the (operation, tenant)
//! key, never a check-then-insert sequence, and `update_with` applies a
//! mutation under an exclusive hold on the request so concurrent decisions
//! serialize instead of overwriting each other. A durable implementation
//! enforces the same invariants with a partial unique constraint on PENDING
//! rows and a row lock (or version CAS) on updates; the memory
//! implementation uses the DashMap entry locks.

use crate::error::ApprovalError;
use crate::request::{ApprovalRequest, ApprovalStatus, RequestId};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ogc_context::TenantId;

/// Storage contract for approval requests
///
/// Requests are never deleted; terminal requests stay readable for audit.
#[async_trait]
pub trait ApprovalStore: Send + Sync + std::fmt::Debug {
    /// Atomically insert a PENDING request for its (operation, tenant) key
    ///
    /// # Errors
    /// - `ApprovalError::PendingExists` when the key already has a PENDING
    ///   request; under N concurrent inserts for one key exactly one wins
    async fn insert_pending(&self, request: ApprovalRequest) -> Result<(), ApprovalError>;

    /// Fetch a request by id
    async fn get(&self, id: RequestId) -> Result<Option<ApprovalRequest>, ApprovalError>;

    /// Atomically load, mutate, and commit a request
    ///
    /// `apply` runs against the current stored value under an exclusive
    /// hold; the mutation commits only when it returns `Ok`, and the
    /// committed request is returned. Two concurrent calls for one id
    /// serialize — the second sees the first's committed state, so an
    /// acknowledged decision can never be overwritten. Committing a
    /// terminal status releases the (operation, tenant) key.
    ///
    /// # Errors
    /// - `ApprovalError::NotFound` for an unknown id
    /// - whatever `apply` returns, with the stored value untouched
    async fn update_with(
        &self,
        id: RequestId,
        apply: &(dyn for<'a> Fn(&'a mut ApprovalRequest) -> Result<(), ApprovalError> + Send + Sync),
    ) -> Result<ApprovalRequest, ApprovalError>;

    /// The PENDING request for (operation, tenant), if any
    async fn find_pending(
        &self,
        operation: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ApprovalRequest>, ApprovalError>;

    /// The most recently created APPROVED request for (operation, tenant)
    async fn find_approved(
        &self,
        operation: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ApprovalRequest>, ApprovalError>;

    /// Every PENDING request, for the expiry sweep
    async fn all_pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalError>;
}

/// In-memory store
///
/// Suitable for a single process; horizontal scaling needs a durable store
/// with the equivalent unique constraint.
#[derive(Debug, Default)]
pub struct MemoryApprovalStore {
    requests: DashMap<RequestId, ApprovalRequest>,
    pending_index: DashMap<(String, TenantId), RequestId>,
}

impl MemoryApprovalStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requests retained (all statuses)
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the store has no requests
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Number of PENDING requests
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_index.len()
    }
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn insert_pending(&self, request: ApprovalRequest) -> Result<(), ApprovalError> {
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalError::Store(format!(
                "insert_pending requires a PENDING request, got {}",
                request.status
            )));
        }
        let key = (request.operation.clone(), request.tenant_id.clone());
        match self.pending_index.entry(key) {
            Entry::Occupied(occupied) => Err(ApprovalError::PendingExists {
                existing: *occupied.get(),
            }),
            Entry::Vacant(vacant) => {
                // The request must be readable before the index points at it.
                self.requests.insert(request.id, request.clone());
                vacant.insert(request.id);
                Ok(())
            }
        }
    }

    async fn get(&self, id: RequestId) -> Result<Option<ApprovalRequest>, ApprovalError> {
        Ok(self.requests.get(&id).map(|r| r.clone()))
    }

    async fn update_with(
        &self,
        id: RequestId,
        apply: &(dyn for<'a> Fn(&'a mut ApprovalRequest) -> Result<(), ApprovalError> + Send + Sync),
    ) -> Result<ApprovalRequest, ApprovalError> {
        let committed = {
            let mut entry = self
                .requests
                .get_mut(&id)
                .ok_or(ApprovalError::NotFound(id))?;
            // Mutate a copy; the stored value changes only on success.
            let mut candidate = entry.value().clone();
            apply(&mut candidate)?;
            *entry.value_mut() = candidate.clone();
            candidate
        };
        if committed.status.is_terminal() {
            let key = (committed.operation.clone(), committed.tenant_id.clone());
            self.pending_index.remove_if(&key, |_, pending| *pending == id);
        }
        Ok(committed)
    }

    async fn find_pending(
        &self,
        operation: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ApprovalRequest>, ApprovalError> {
        let key = (operation.to_string(), tenant_id.clone());
        let Some(id) = self.pending_index.get(&key).map(|r| *r) else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn find_approved(
        &self,
        operation: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ApprovalRequest>, ApprovalError> {
        Ok(self
            .requests
            .iter()
            .filter(|r| {
                r.status == ApprovalStatus::Approved
                    && r.operation == operation
                    && &r.tenant_id == tenant_id
            })
            .map(|r| r.clone())
            .max_by_key(|r| r.created_at))
    }

    async fn all_pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let mut pending = Vec::with_capacity(self.pending_index.len());
        for entry in &self.pending_index {
            if let Some(request) = self.requests.get(entry.value()) {
                pending.push(request.clone());
            }
        }
        Ok(pending)
    }
}
