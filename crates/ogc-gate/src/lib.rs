//! OGC Gate - Per-tenant feature gating
//!
//! Dangerous operations stay dark until a tenant explicitly opts in:
//! - Flag catalog with per-flag defaults, globally-fixed values, and a
//!   minimum mutation role
//! - An authoritative async [`FlagStore`] for tenant overrides
//! - A short-TTL advisory cache in front of the store
//!
//! The cache never decides anything on its own: a miss just triggers a
//! fresh resolution and a fill, and any entry can be evicted at any time.

#![warn(unreachable_pub)]

pub mod error;
pub mod flag;
pub mod gate;
pub mod store;

pub use error::GateError;
pub use flag::{FlagCheck, FlagDefinition, FlagSource};
pub use gate::FeatureGate;
pub use store::{FlagStore, MemoryFlagStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
