//! Parameter-validation rules
//!
//! Rules are a closed enumeration rather than free-form callbacks, so the
//! whole rule surface stays serializable and auditable. Evaluation collects
//! every violation instead of stopping at the first, letting callers report
//! all problems at once.

use ogc_context::{ActorId, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One parameter-validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamRule {
    /// Field must be present and non-null
    Required {
        /// Parameter field name
        field: String,
    },
    /// Field, when present, must be a non-empty string
    NonEmpty {
        /// Parameter field name
        field: String,
    },
    /// Field must equal a fixed value
    Equals {
        /// Parameter field name
        field: String,
        /// Expected value
        value: Value,
    },
    /// Field must be one of the listed values
    OneOf {
        /// Parameter field name
        field: String,
        /// Accepted values
        values: Vec<Value>,
    },
    /// Field must be a string equal to the tenant id
    ///
    /// The confirmation-token rule: a deletion requires the caller to echo
    /// the tenant id back explicitly.
    MatchesTenantId {
        /// Parameter field name
        field: String,
    },
    /// The free-form reason must be at least this long
    ReasonMinLength {
        /// Minimum character count
        min: usize,
    },
}

impl ParamRule {
    /// Evaluate the rule, returning a violation message on failure
    #[must_use]
    pub fn check(
        &self,
        tenant_id: &TenantId,
        _requester: &ActorId,
        params: &Value,
        reason: &str,
    ) -> Option<String> {
        match self {
            Self::Required { field } => match params.get(field) {
                Some(v) if !v.is_null() => None,
                _ => Some(format!("missing required parameter: {field}")),
            },
            Self::NonEmpty { field } => match params.get(field) {
                Some(Value::String(s)) if s.is_empty() => {
                    Some(format!("parameter must not be empty: {field}"))
                }
                Some(Value::String(_)) | None => None,
                Some(_) => Some(format!("parameter must be a string: {field}")),
            },
            Self::Equals { field, value } => match params.get(field) {
                Some(v) if v == value => None,
                _ => Some(format!("parameter {field} must equal {value}")),
            },
            Self::OneOf { field, values } => match params.get(field) {
                Some(v) if values.contains(v) => None,
                _ => Some(format!("parameter {field} must be one of the accepted values")),
            },
            Self::MatchesTenantId { field } => match params.get(field) {
                Some(Value::String(s)) if s == tenant_id.as_str() => None,
                _ => Some(format!(
                    "parameter {field} must match the tenant id as an explicit confirmation"
                )),
            },
            Self::ReasonMinLength { min } => {
                if reason.chars().count() < *min {
                    Some(format!("reason must be at least {min} characters"))
                } else {
                    None
                }
            }
        }
    }
}

/// Result of validating one operation's parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// True when no rule was violated
    pub valid: bool,
    /// Every violated rule, in rule order
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    /// Outcome with no violations
    #[inline]
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Outcome from collected violations
    #[must_use]
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}
