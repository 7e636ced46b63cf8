//! Operation definitions
//!
//! An [`OperationDefinition`] is the typed catalog entry for one dangerous
//! administrative action. Definitions are immutable once registered; the
//! registry hands them out behind `Arc` and never mutates them at runtime.

use crate::rules::ParamRule;
use serde::{Deserialize, Serialize};

/// Risk classification of a dangerous operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Routine, reversible
    Low,
    /// Reversible with effort
    Medium,
    /// Hard to reverse
    High,
    /// Irreversible or tenant-destroying
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Multi-party approval policy for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalPolicy {
    /// No approval workflow
    None,
    /// One admin approval
    SingleAdmin,
    /// Quorum of distinct admin approvals (at least two)
    MultiAdmin {
        /// Configured quorum; values below two are clamped up
        required_approvers: u32,
    },
}

impl ApprovalPolicy {
    /// Number of distinct approving decisions required
    #[must_use]
    pub fn required_approvers(self) -> u32 {
        match self {
            Self::None => 0,
            Self::SingleAdmin => 1,
            Self::MultiAdmin { required_approvers } => required_approvers.max(2),
        }
    }

    /// Whether this policy requires any approval at all
    #[inline]
    #[must_use]
    pub fn requires_approval(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Catalog entry for one dangerous operation
///
/// Identity is the unique `name`. Looked up by the orchestrator on every
/// check; never mutated after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDefinition {
    /// Unique operation name (SCREAMING_SNAKE by convention)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Risk classification
    pub risk: RiskLevel,
    /// Permission strings the actor must hold, all of them
    pub required_permissions: Vec<String>,
    /// Approval policy
    pub policy: ApprovalPolicy,
    /// Feature flag that gates the operation, if any
    pub feature_flag: Option<String>,
    /// Parameter-validation rules, evaluated in order
    pub rules: Vec<ParamRule>,
}

impl OperationDefinition {
    /// Create definition with no permissions, no policy, no gate
    #[must_use]
    pub fn new(name: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            risk,
            required_permissions: Vec::new(),
            policy: ApprovalPolicy::None,
            feature_flag: None,
            rules: Vec::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With required permissions
    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// With approval policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// With gating feature flag
    #[inline]
    #[must_use]
    pub fn with_feature_flag(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = Some(flag.into());
        self
    }

    /// With a parameter-validation rule appended
    #[inline]
    #[must_use]
    pub fn with_rule(mut self, rule: ParamRule) -> Self {
        self.rules.push(rule);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_required_approvers() {
        assert_eq!(ApprovalPolicy::None.required_approvers(), 0);
        assert_eq!(ApprovalPolicy::SingleAdmin.required_approvers(), 1);
        assert_eq!(
            ApprovalPolicy::MultiAdmin {
                required_approvers: 3
            }
            .required_approvers(),
            3
        );
        // Multi-admin never drops below two
        assert_eq!(
            ApprovalPolicy::MultiAdmin {
                required_approvers: 1
            }
            .required_approvers(),
            2
        );
    }

    #[test]
    fn policy_requires_approval() {
        assert!(!ApprovalPolicy::None.requires_approval());
        assert!(ApprovalPolicy::SingleAdmin.requires_approval());
    }

    #[test]
    fn definition_builder() {
        let def = OperationDefinition::new("BULK_DATA_PURGE", RiskLevel::High)
            .with_description("purge tenant data in bulk")
            .with_permissions(["data:purge"])
            .with_policy(ApprovalPolicy::SingleAdmin)
            .with_feature_flag("DANGEROUS_OPERATIONS");

        assert_eq!(def.name, "BULK_DATA_PURGE");
        assert_eq!(def.required_permissions, vec!["data:purge".to_string()]);
        assert_eq!(def.feature_flag.as_deref(), Some("DANGEROUS_OPERATIONS"));
        assert!(def.policy.requires_approval());
    }
}
