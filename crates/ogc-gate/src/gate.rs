//! The feature gate service
//!
//! Resolution order: explicit tenant override, else globally-fixed value,
//! else catalog default. Resolved values sit in a short-TTL moka cache
//! keyed by (tenant, flag); the backing store stays authoritative.

use crate::error::GateError;
use crate::flag::{FlagCheck, FlagDefinition, FlagSource};
use crate::store::FlagStore;
use indexmap::IndexMap;
use moka::future::Cache;
use ogc_audit::{AuditTrail, EventCategory, EventOutcome, StepEvent};
use ogc_context::{ActorRole, CorrelationId, TenantContext, TenantId};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Default advisory-cache TTL
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
/// Default advisory-cache capacity
const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Per-tenant feature gate
///
/// Explicitly constructed at process start and shared behind `Arc`.
#[derive(Debug)]
pub struct FeatureGate {
    flags: IndexMap<String, FlagDefinition>,
    store: Arc<dyn FlagStore>,
    cache: Cache<(TenantId, String), (bool, FlagSource)>,
    trail: Arc<AuditTrail>,
}

impl FeatureGate {
    /// Create a gate with an empty catalog and the default cache TTL
    #[must_use]
    pub fn new(store: Arc<dyn FlagStore>, trail: Arc<AuditTrail>) -> Self {
        Self::with_cache_ttl(store, trail, DEFAULT_CACHE_TTL)
    }

    /// Create a gate with an explicit cache TTL
    #[must_use]
    pub fn with_cache_ttl(
        store: Arc<dyn FlagStore>,
        trail: Arc<AuditTrail>,
        ttl: Duration,
    ) -> Self {
        Self {
            flags: IndexMap::new(),
            store,
            cache: Cache::builder()
                .max_capacity(DEFAULT_CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
            trail,
        }
    }

    /// Create a gate seeded with the builtin flag catalog
    #[must_use]
    pub fn with_builtin(store: Arc<dyn FlagStore>, trail: Arc<AuditTrail>) -> Self {
        let mut gate = Self::new(store, trail);
        for def in builtin_flags() {
            gate.register(def);
        }
        gate
    }

    /// Register a flag definition
    ///
    /// Later registrations with the same name replace earlier ones; done
    /// before the gate is shared, never at runtime.
    pub fn register(&mut self, def: FlagDefinition) {
        self.flags.insert(def.name.clone(), def);
    }

    /// All registered flag names, in registration order
    #[must_use]
    pub fn flag_names(&self) -> Vec<&str> {
        self.flags.keys().map(String::as_str).collect()
    }

    /// Look up a flag definition
    #[inline]
    #[must_use]
    pub fn definition(&self, flag: &str) -> Option<&FlagDefinition> {
        self.flags.get(flag)
    }

    /// Resolve a flag for a tenant
    ///
    /// A cache miss is not an error; it triggers a fresh resolution against
    /// the authoritative store plus a cache fill.
    ///
    /// # Errors
    /// - `GateError::UnknownFlag` if the flag is not in the catalog
    /// - `GateError::Store` on backing-store failure
    pub async fn is_enabled(
        &self,
        flag: &str,
        ctx: &TenantContext,
    ) -> Result<FlagCheck, GateError> {
        let def = self
            .flags
            .get(flag)
            .ok_or_else(|| GateError::UnknownFlag(flag.to_string()))?;

        let key = (ctx.tenant_id.clone(), flag.to_string());
        if let Some((enabled, source)) = self.cache.get(&key).await {
            return Ok(FlagCheck {
                enabled,
                source,
                cached: true,
            });
        }

        let (enabled, source) = self.resolve(def, &ctx.tenant_id).await?;
        self.cache.insert(key, (enabled, source)).await;

        Ok(FlagCheck {
            enabled,
            source,
            cached: false,
        })
    }

    /// Change a flag for a tenant
    ///
    /// Requires the actor's role to meet the flag's minimum; globally-fixed
    /// flags reject overrides outright. Never partially applies: the store
    /// write, cache invalidation, and audit record happen only after every
    /// precondition passes.
    ///
    /// # Errors
    /// - `GateError::UnknownFlag` if the flag is not in the catalog
    /// - `GateError::GloballyFixed` if the flag cannot be overridden
    /// - `GateError::InsufficientRole` if the actor's role is too low
    /// - `GateError::Store` / `GateError::Audit` on collaborator failure
    pub async fn set_enabled(
        &self,
        flag: &str,
        tenant_id: &TenantId,
        enabled: bool,
        actor: &TenantContext,
        reason: &str,
        correlation_id: CorrelationId,
    ) -> Result<FlagCheck, GateError> {
        let def = self
            .flags
            .get(flag)
            .ok_or_else(|| GateError::UnknownFlag(flag.to_string()))?;

        if def.global_value.is_some() {
            return Err(GateError::GloballyFixed(flag.to_string()));
        }

        if !actor.role.at_least(def.min_mutation_role) {
            self.trail
                .track(
                    correlation_id,
                    tenant_id,
                    &actor.actor_id,
                    StepEvent::new("flag_change", EventCategory::FeatureGate, EventOutcome::Denied)
                        .with_resource("feature_flag", flag)
                        .with_metadata(json!({
                            "required_role": def.min_mutation_role.to_string(),
                            "held_role": actor.role.to_string(),
                            "reason": reason,
                        })),
                )
                .await?;
            return Err(GateError::InsufficientRole {
                required: def.min_mutation_role,
                held: actor.role,
            });
        }

        self.store.set_override(tenant_id, flag, enabled).await?;
        self.cache
            .invalidate(&(tenant_id.clone(), flag.to_string()))
            .await;

        tracing::info!(
            flag,
            tenant = %tenant_id,
            enabled,
            actor = %actor.actor_id,
            "feature flag changed"
        );
        self.trail
            .track(
                correlation_id,
                tenant_id,
                &actor.actor_id,
                StepEvent::new("flag_change", EventCategory::FeatureGate, EventOutcome::Success)
                    .with_resource("feature_flag", flag)
                    .with_metadata(json!({ "enabled": enabled, "reason": reason })),
            )
            .await?;

        Ok(FlagCheck {
            enabled,
            source: FlagSource::Tenant,
            cached: false,
        })
    }

    async fn resolve(
        &self,
        def: &FlagDefinition,
        tenant_id: &TenantId,
    ) -> Result<(bool, FlagSource), GateError> {
        if let Some(fixed) = def.global_value {
            return Ok((fixed, FlagSource::Global));
        }
        if let Some(explicit) = self.store.get_override(tenant_id, &def.name).await? {
            return Ok((explicit, FlagSource::Tenant));
        }
        Ok((def.default_enabled, FlagSource::Default))
    }

    /// Drop every cached entry; the next checks re-resolve from the store
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }
}

/// The builtin flag catalog
fn builtin_flags() -> Vec<FlagDefinition> {
    vec![FlagDefinition::new("DANGEROUS_OPERATIONS")
        .with_description("master opt-in for dangerous administrative operations")
        .with_min_mutation_role(ActorRole::Owner)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFlagStore;
    use ogc_audit::MemoryAuditSink;

    fn gate() -> (Arc<MemoryFlagStore>, Arc<MemoryAuditSink>, FeatureGate) {
        let store = Arc::new(MemoryFlagStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let trail = Arc::new(AuditTrail::new(sink.clone()));
        let gate = FeatureGate::with_builtin(store.clone(), trail);
        (store, sink, gate)
    }

    fn owner(tenant: &str) -> TenantContext {
        TenantContext::new(tenant, "owner-1", ActorRole::Owner)
    }

    #[tokio::test]
    async fn default_resolution_when_no_override() {
        let (_store, _sink, gate) = gate();
        let ctx = owner("t1");

        let check = gate.is_enabled("DANGEROUS_OPERATIONS", &ctx).await.unwrap();
        assert!(!check.enabled);
        assert_eq!(check.source, FlagSource::Default);
        assert!(!check.cached);
    }

    #[tokio::test]
    async fn second_check_is_served_from_cache() {
        let (_store, _sink, gate) = gate();
        let ctx = owner("t1");

        let first = gate.is_enabled("DANGEROUS_OPERATIONS", &ctx).await.unwrap();
        let second = gate.is_enabled("DANGEROUS_OPERATIONS", &ctx).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.enabled, second.enabled);
    }

    #[tokio::test]
    async fn set_enabled_overrides_and_invalidates() {
        let (_store, sink, gate) = gate();
        let ctx = owner("t1");
        let correlation = CorrelationId::new();

        // Warm the cache with the default.
        let before = gate.is_enabled("DANGEROUS_OPERATIONS", &ctx).await.unwrap();
        assert!(!before.enabled);

        gate.set_enabled(
            "DANGEROUS_OPERATIONS",
            &ctx.tenant_id,
            true,
            &ctx,
            "enabling for migration",
            correlation,
        )
        .await
        .unwrap();

        let after = gate.is_enabled("DANGEROUS_OPERATIONS", &ctx).await.unwrap();
        assert!(after.enabled);
        assert_eq!(after.source, FlagSource::Tenant);
        assert!(!after.cached);

        assert_eq!(sink.records_for(correlation).len(), 1);
    }

    #[tokio::test]
    async fn mutation_below_min_role_fails_without_applying() {
        let (store, _sink, gate) = gate();
        let member = TenantContext::new("t1", "member-1", ActorRole::Member);

        let err = gate
            .set_enabled(
                "DANGEROUS_OPERATIONS",
                &member.tenant_id,
                true,
                &member,
                "trying anyway",
                CorrelationId::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::InsufficientRole { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn globally_fixed_flag_rejects_overrides() {
        let store = Arc::new(MemoryFlagStore::new());
        let trail = Arc::new(AuditTrail::new(Arc::new(MemoryAuditSink::new())));
        let mut gate = FeatureGate::new(store, trail);
        gate.register(FlagDefinition::new("KILL_SWITCH").globally_fixed(true));

        let ctx = owner("t1");
        let check = gate.is_enabled("KILL_SWITCH", &ctx).await.unwrap();
        assert!(check.enabled);
        assert_eq!(check.source, FlagSource::Global);

        let err = gate
            .set_enabled(
                "KILL_SWITCH",
                &ctx.tenant_id,
                false,
                &ctx,
                "no",
                CorrelationId::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::GloballyFixed(_)));
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let (_store, _sink, gate) = gate();
        let t1 = owner("t1");
        let t2 = owner("t2");
        let correlation = CorrelationId::new();

        gate.set_enabled(
            "DANGEROUS_OPERATIONS",
            &t1.tenant_id,
            true,
            &t1,
            "t1 opted in",
            correlation,
        )
        .await
        .unwrap();

        assert!(gate.is_enabled("DANGEROUS_OPERATIONS", &t1).await.unwrap().enabled);
        assert!(!gate.is_enabled("DANGEROUS_OPERATIONS", &t2).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn unknown_flag_errors() {
        let (_store, _sink, gate) = gate();
        let ctx = owner("t1");
        let err = gate.is_enabled("NOT_A_FLAG", &ctx).await.unwrap_err();
        assert!(matches!(err, GateError::UnknownFlag(_)));
    }

    #[tokio::test]
    async fn cache_eviction_is_harmless() {
        let (store, _sink, gate) = gate();
        let ctx = owner("t1");

        let _ = gate.is_enabled("DANGEROUS_OPERATIONS", &ctx).await.unwrap();
        // Flip the store behind the cache's back, then evict.
        store
            .set_override(&ctx.tenant_id, "DANGEROUS_OPERATIONS", true)
            .await
            .unwrap();
        gate.invalidate_cache();

        let check = gate.is_enabled("DANGEROUS_OPERATIONS", &ctx).await.unwrap();
        assert!(check.enabled);
        assert_eq!(check.source, FlagSource::Tenant);
    }
}
