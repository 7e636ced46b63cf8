//! Authoritative flag-override store
//!
//! The store, not the cache, owns the truth for per-tenant overrides. The
//! production deployment backs this with the relational layer; the memory
//! implementation serves tests and single-process use.

use crate::error::GateError;
use async_trait::async_trait;
use dashmap::DashMap;
use ogc_context::TenantId;

/// Backing store for per-tenant flag overrides
#[async_trait]
pub trait FlagStore: Send + Sync + std::fmt::Debug {
    /// Fetch the explicit override for (tenant, flag), if any
    ///
    /// # Errors
    /// - `GateError::Store` on backing-store failure
    async fn get_override(
        &self,
        tenant_id: &TenantId,
        flag: &str,
    ) -> Result<Option<bool>, GateError>;

    /// Write the explicit override for (tenant, flag)
    ///
    /// # Errors
    /// - `GateError::Store` on backing-store failure
    async fn set_override(
        &self,
        tenant_id: &TenantId,
        flag: &str,
        enabled: bool,
    ) -> Result<(), GateError>;
}

/// In-memory override store
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    overrides: DashMap<(TenantId, String), bool>,
}

impl MemoryFlagStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored overrides
    #[must_use]
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Whether the store holds no overrides
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn get_override(
        &self,
        tenant_id: &TenantId,
        flag: &str,
    ) -> Result<Option<bool>, GateError> {
        Ok(self
            .overrides
            .get(&(tenant_id.clone(), flag.to_string()))
            .map(|v| *v))
    }

    async fn set_override(
        &self,
        tenant_id: &TenantId,
        flag: &str,
        enabled: bool,
    ) -> Result<(), GateError> {
        self.overrides
            .insert((tenant_id.clone(), flag.to_string()), enabled);
        Ok(())
    }
}
