//! Aggregate counters and health classification
//!
//! Counters accumulate across every tracker; `generate_report` folds them
//! into a HEALTHY/WARNING/CRITICAL classification with threshold alerts.

use serde::{Deserialize, Serialize};

/// Snapshot of the audit trail's aggregate counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetrics {
    /// Events tracked across all correlations
    pub total_events: u64,
    /// Guardrail pipeline stage outcomes
    pub guardrail_checks: u64,
    /// Guardrail denials (expected governance outcomes)
    pub guardrail_denials: u64,
    /// Guardrail internal failures (fail-closed conversions)
    pub guardrail_errors: u64,
    /// Approval workflow transitions
    pub approval_events: u64,
    /// Executor invocations
    pub executions: u64,
    /// Trackers started (explicitly or implicitly)
    pub trackers_started: u64,
    /// Trackers started implicitly by an out-of-order `track`
    pub implicit_starts: u64,
    /// Trackers finalized by `end`
    pub trackers_ended: u64,
    /// Durable records written
    pub records_written: u64,
    /// Durable writes that failed
    pub sink_failures: u64,
}

impl AuditMetrics {
    /// Ratio of guardrail internal failures to guardrail stage outcomes
    #[must_use]
    pub fn guardrail_error_ratio(&self) -> f64 {
        if self.guardrail_checks == 0 {
            0.0
        } else {
            self.guardrail_errors as f64 / self.guardrail_checks as f64
        }
    }

    /// Ratio of denials to guardrail stage outcomes
    #[must_use]
    pub fn guardrail_denial_ratio(&self) -> f64 {
        if self.guardrail_checks == 0 {
            0.0
        } else {
            self.guardrail_denials as f64 / self.guardrail_checks as f64
        }
    }
}

/// Three-level system health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemHealth {
    /// No alerts above low severity
    Healthy,
    /// At least one high-severity alert
    Warning,
    /// At least one critical-severity alert
    Critical,
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational
    Low,
    /// Worth a look
    Medium,
    /// Degraded; classify system as WARNING
    High,
    /// Broken; classify system as CRITICAL
    Critical,
}

/// One threshold alert derived from the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAlert {
    /// Severity
    pub severity: AlertSeverity,
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

impl HealthAlert {
    /// Create an alert
    #[must_use]
    pub fn new(
        severity: AlertSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Health report over the aggregated counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall classification
    pub health: SystemHealth,
    /// Alerts that drove the classification
    pub alerts: Vec<HealthAlert>,
    /// Counter snapshot the report was derived from
    pub metrics: AuditMetrics,
}

/// Guardrail error ratio above this fraction raises a high-severity alert
const ERROR_RATIO_THRESHOLD: f64 = 0.10;
/// Denial ratio above this fraction raises a medium-severity alert
const DENIAL_RATIO_THRESHOLD: f64 = 0.50;

/// Derive the health report from a counter snapshot
#[must_use]
pub(crate) fn classify(metrics: AuditMetrics) -> HealthReport {
    let mut alerts = Vec::new();

    if metrics.sink_failures > 0 {
        alerts.push(HealthAlert::new(
            AlertSeverity::Critical,
            "audit_sink_failures",
            format!(
                "{} durable audit writes failed; governance decisions are losing provenance",
                metrics.sink_failures
            ),
        ));
    }

    if metrics.guardrail_checks > 0 && metrics.guardrail_error_ratio() > ERROR_RATIO_THRESHOLD {
        alerts.push(HealthAlert::new(
            AlertSeverity::High,
            "guardrail_error_ratio",
            format!(
                "guardrail internal error ratio {:.1}% exceeds {:.0}%",
                metrics.guardrail_error_ratio() * 100.0,
                ERROR_RATIO_THRESHOLD * 100.0
            ),
        ));
    }

    if metrics.guardrail_checks > 0 && metrics.guardrail_denial_ratio() > DENIAL_RATIO_THRESHOLD {
        alerts.push(HealthAlert::new(
            AlertSeverity::Medium,
            "guardrail_denial_ratio",
            format!(
                "guardrail denial ratio {:.1}% exceeds {:.0}%",
                metrics.guardrail_denial_ratio() * 100.0,
                DENIAL_RATIO_THRESHOLD * 100.0
            ),
        ));
    }

    if metrics.implicit_starts > 0 {
        alerts.push(HealthAlert::new(
            AlertSeverity::Low,
            "implicit_tracker_starts",
            format!(
                "{} trackers were started implicitly; a start call was dropped somewhere",
                metrics.implicit_starts
            ),
        ));
    }

    let health = if alerts.iter().any(|a| a.severity == AlertSeverity::Critical) {
        SystemHealth::Critical
    } else if alerts.iter().any(|a| a.severity == AlertSeverity::High) {
        SystemHealth::Warning
    } else {
        SystemHealth::Healthy
    };

    HealthReport {
        health,
        alerts,
        metrics,
    }
}
