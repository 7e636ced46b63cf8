//! OGC Context - Tenant and actor identity
//!
//! Foundation types shared by every OGC crate:
//! - Tenant and actor id newtypes
//! - Ordered actor roles
//! - The resolved [`TenantContext`] carried through every guardrail check
//! - Correlation ids linking a causal decision chain
//!
//! # Example
//!
//! ```rust
//! use ogc_context::{ActorRole, CorrelationId, TenantContext};
//!
//! let ctx = TenantContext::new("tenant-1", "actor-1", ActorRole::Admin)
//!     .with_permissions(["tenant:delete"]);
//!
//! assert!(ctx.has_permissions(&["tenant:delete".to_string()]));
//! let correlation = CorrelationId::new();
//! assert!(!correlation.to_string().is_empty());
//! ```

#![warn(unreachable_pub)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Unique tenant identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    /// Create tenant id from a string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique actor identifier (a user or a service principal)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    /// Create actor id from a string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation id linking every audit event of one causal decision chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Actor roles, ordered by privilege
///
/// Role comparisons use the derived ordering, so `role >= ActorRole::Admin`
/// reads as "admin or better".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorRole {
    /// Read-only access
    Viewer,
    /// Ordinary tenant member
    Member,
    /// Tenant administrator
    Admin,
    /// Tenant owner
    Owner,
    /// Internal service principal (background jobs)
    System,
}

impl ActorRole {
    /// Check whether this role meets a minimum requirement
    #[inline]
    #[must_use]
    pub fn at_least(self, minimum: ActorRole) -> bool {
        self >= minimum
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Viewer => "viewer",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
            Self::System => "system",
        };
        write!(f, "{s}")
    }
}

/// Resolved tenant/actor context for one request or job
///
/// Built by the authentication boundary before any guardrail check runs;
/// its absence at that boundary is itself a denial, never a default-allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    /// Tenant the action is scoped to
    pub tenant_id: TenantId,
    /// Actor performing the action
    pub actor_id: ActorId,
    /// Actor's role within the tenant
    pub role: ActorRole,
    /// Granted permission strings
    pub permissions: BTreeSet<String>,
}

impl TenantContext {
    /// Create context with an empty permission set
    #[inline]
    #[must_use]
    pub fn new(
        tenant_id: impl Into<TenantId>,
        actor_id: impl Into<ActorId>,
        role: ActorRole,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            actor_id: actor_id.into(),
            role,
            permissions: BTreeSet::new(),
        }
    }

    /// With granted permissions
    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether the context holds every listed permission
    #[must_use]
    pub fn has_permissions(&self, required: &[String]) -> bool {
        required.iter().all(|p| self.permissions.contains(p))
    }

    /// Permissions from `required` that the context does not hold
    #[must_use]
    pub fn missing_permissions(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|p| !self.permissions.contains(*p))
            .cloned()
            .collect()
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
