//! Name-keyed operation catalog
//!
//! Built once at process start and shared behind `Arc`; lookups are pure
//! reads and validation has no side effects.

use crate::definition::{ApprovalPolicy, OperationDefinition, RiskLevel};
use crate::error::RegistryError;
use crate::rules::{ParamRule, ValidationOutcome};
use indexmap::IndexMap;
use ogc_context::{ActorId, TenantId};
use serde_json::Value;
use std::sync::Arc;

/// Catalog of dangerous operations
#[derive(Debug, Default, Clone)]
pub struct OperationRegistry {
    operations: IndexMap<String, Arc<OperationDefinition>>,
}

impl OperationRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            operations: IndexMap::new(),
        }
    }

    /// Create registry seeded with the builtin catalog
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for def in builtin_catalog() {
            // Builtin names are unique by construction.
            let _ = registry.register(def);
        }
        registry
    }

    /// Register a definition
    ///
    /// # Errors
    /// - `RegistryError::DuplicateDefinition` if the name is already taken
    pub fn register(&mut self, def: OperationDefinition) -> Result<(), RegistryError> {
        if self.operations.contains_key(&def.name) {
            return Err(RegistryError::DuplicateDefinition(def.name));
        }
        self.operations.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Look up a definition by name
    #[inline]
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<OperationDefinition>> {
        self.operations.get(name).cloned()
    }

    /// Whether the catalog contains a name
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// All registered names, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }

    /// Number of registered operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Validate parameters against an operation's rule set
    ///
    /// Applies every rule in order and returns all violations, not just the
    /// first. Pure function of the catalog and the input.
    ///
    /// # Errors
    /// - `RegistryError::UnknownOperation` if the name is not registered
    pub fn validate(
        &self,
        operation: &str,
        tenant_id: &TenantId,
        requester: &ActorId,
        params: &Value,
        reason: &str,
    ) -> Result<ValidationOutcome, RegistryError> {
        let def = self
            .lookup(operation)
            .ok_or_else(|| RegistryError::UnknownOperation(operation.to_string()))?;

        let errors: Vec<String> = def
            .rules
            .iter()
            .filter_map(|rule| rule.check(tenant_id, requester, params, reason))
            .collect();

        Ok(ValidationOutcome::from_errors(errors))
    }
}

/// The builtin dangerous-operation catalog
///
/// Callers can extend the registry with their own definitions before
/// freezing it behind `Arc`.
fn builtin_catalog() -> Vec<OperationDefinition> {
    vec![
        OperationDefinition::new("TENANT_DELETION", RiskLevel::Critical)
            .with_description("permanently delete a tenant and all of its data")
            .with_permissions(["tenant:delete"])
            .with_policy(ApprovalPolicy::MultiAdmin {
                required_approvers: 2,
            })
            .with_feature_flag("DANGEROUS_OPERATIONS")
            .with_rule(ParamRule::Required {
                field: "confirmation".to_string(),
            })
            .with_rule(ParamRule::MatchesTenantId {
                field: "confirmation".to_string(),
            })
            .with_rule(ParamRule::ReasonMinLength { min: 10 }),
        OperationDefinition::new("OWNERSHIP_TRANSFER", RiskLevel::High)
            .with_description("transfer tenant ownership to another actor")
            .with_permissions(["tenant:transfer"])
            .with_policy(ApprovalPolicy::MultiAdmin {
                required_approvers: 2,
            })
            .with_feature_flag("DANGEROUS_OPERATIONS")
            .with_rule(ParamRule::Required {
                field: "new_owner_id".to_string(),
            })
            .with_rule(ParamRule::NonEmpty {
                field: "new_owner_id".to_string(),
            }),
        OperationDefinition::new("BULK_DATA_PURGE", RiskLevel::High)
            .with_description("purge tenant data in bulk")
            .with_permissions(["data:purge"])
            .with_policy(ApprovalPolicy::SingleAdmin)
            .with_feature_flag("DANGEROUS_OPERATIONS")
            .with_rule(ParamRule::Required {
                field: "scope".to_string(),
            })
            .with_rule(ParamRule::OneOf {
                field: "scope".to_string(),
                values: vec![
                    Value::String("soft".to_string()),
                    Value::String("hard".to_string()),
                ],
            }),
        OperationDefinition::new("AUDIT_LOG_OVERRIDE", RiskLevel::Critical)
            .with_description("override retention on immutable audit records")
            .with_permissions(["audit:override"])
            .with_policy(ApprovalPolicy::MultiAdmin {
                required_approvers: 2,
            })
            .with_feature_flag("DANGEROUS_OPERATIONS")
            .with_rule(ParamRule::ReasonMinLength { min: 20 }),
        OperationDefinition::new("SUBSCRIPTION_DOWNGRADE", RiskLevel::Medium)
            .with_description("downgrade a tenant's subscription tier")
            .with_permissions(["billing:write"])
            .with_policy(ApprovalPolicy::SingleAdmin)
            .with_rule(ParamRule::Required {
                field: "target_tier".to_string(),
            }),
    ]
}
