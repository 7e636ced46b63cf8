//! Guardrail configuration
//!
//! Enforcement toggles exist for staged rollouts; disabling a layer is
//! itself audited, never silent. Error detail defaults to sanitized, the
//! production-safe setting.

use serde::{Deserialize, Serialize};

/// Orchestrator configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Enforce at the request boundary (middleware adapter)
    pub enforce_api: bool,
    /// Enforce at the service entry points (`check_operation`, execute)
    pub enforce_service: bool,
    /// Enforce for background jobs (`require_dangerous_permission`)
    pub enforce_background: bool,
    /// Log denials as security-severity events instead of ordinary
    /// authorization events
    pub log_failures_as_security: bool,
    /// Replace internal error detail with a generic message in results
    /// returned to callers; the full detail always reaches the audit trail
    pub sanitize_errors: bool,
}

impl GuardrailConfig {
    /// Create the default configuration (everything enforced, sanitized)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With API-boundary enforcement
    #[inline]
    #[must_use]
    pub fn with_api_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_api = enforce;
        self
    }

    /// With service-level enforcement
    #[inline]
    #[must_use]
    pub fn with_service_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_service = enforce;
        self
    }

    /// With background-job enforcement
    #[inline]
    #[must_use]
    pub fn with_background_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_background = enforce;
        self
    }

    /// With security-severity denial logging
    #[inline]
    #[must_use]
    pub fn with_security_logging(mut self, security: bool) -> Self {
        self.log_failures_as_security = security;
        self
    }

    /// With error-detail sanitization
    #[inline]
    #[must_use]
    pub fn with_sanitized_errors(mut self, sanitize: bool) -> Self {
        self.sanitize_errors = sanitize;
        self
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enforce_api: true,
            enforce_service: true,
            enforce_background: true,
            log_failures_as_security: true,
            sanitize_errors: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_fail_closed_and_sanitized() {
        let config = GuardrailConfig::new();
        assert!(config.enforce_api);
        assert!(config.enforce_service);
        assert!(config.enforce_background);
        assert!(config.sanitize_errors);
    }

    #[test]
    fn builder_toggles() {
        let config = GuardrailConfig::new()
            .with_service_enforcement(false)
            .with_sanitized_errors(false);
        assert!(!config.enforce_service);
        assert!(!config.sanitize_errors);
        assert!(config.enforce_api);
    }
}
