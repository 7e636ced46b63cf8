//! Flag definitions and resolved checks

use ogc_context::ActorRole;
use serde::{Deserialize, Serialize};

/// Where a resolved flag value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSource {
    /// Explicit per-tenant override
    Tenant,
    /// Globally fixed value; tenant overrides are rejected outright
    Global,
    /// No override; the catalog default applies
    Default,
}

/// Result of one flag resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCheck {
    /// Resolved value
    pub enabled: bool,
    /// Provenance of the value
    pub source: FlagSource,
    /// Whether the value was served from the advisory cache
    pub cached: bool,
}

/// Catalog entry for one feature flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    /// Unique flag name (SCREAMING_SNAKE by convention)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Value when neither an override nor a global fix applies
    pub default_enabled: bool,
    /// Globally fixed value; set means per-tenant overrides are rejected
    pub global_value: Option<bool>,
    /// Minimum role required to change the flag for a tenant
    pub min_mutation_role: ActorRole,
}

impl FlagDefinition {
    /// Create a flag that defaults to disabled, mutable by admins
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            default_enabled: false,
            global_value: None,
            min_mutation_role: ActorRole::Admin,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With catalog default
    #[inline]
    #[must_use]
    pub fn with_default(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    /// Fix the flag globally; per-tenant overrides become invalid
    #[inline]
    #[must_use]
    pub fn globally_fixed(mut self, enabled: bool) -> Self {
        self.global_value = Some(enabled);
        self
    }

    /// With minimum mutation role
    #[inline]
    #[must_use]
    pub fn with_min_mutation_role(mut self, role: ActorRole) -> Self {
        self.min_mutation_role = role;
        self
    }
}
