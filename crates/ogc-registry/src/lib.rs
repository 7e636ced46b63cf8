//! OGC Registry - Dangerous-operation catalog
//!
//! The leaf component of the governance control plane:
//! - Typed [`OperationDefinition`]s (risk level, permissions, approval policy)
//! - Name-keyed lookup, immutable once handed to the orchestrator
//! - Parameter validation that reports every violated rule at once
//!
//! # Example
//!
//! ```rust
//! use ogc_registry::OperationRegistry;
//!
//! let registry = OperationRegistry::with_builtin();
//! let op = registry.lookup("TENANT_DELETION").expect("builtin operation");
//! assert_eq!(op.policy.required_approvers(), 2);
//! ```

#![warn(unreachable_pub)]

pub mod definition;
pub mod error;
pub mod registry;
pub mod rules;

pub use definition::{ApprovalPolicy, OperationDefinition, RiskLevel};
pub use error::RegistryError;
pub use registry::OperationRegistry;
pub use rules::{ParamRule, ValidationOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
