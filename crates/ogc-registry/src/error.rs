//! Error types for the operation registry

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Operation name is not in the catalog
    #[error("unregistered operation: {0}")]
    UnknownOperation(String),

    /// A definition with the same name is already registered
    #[error("duplicate operation definition: {0}")]
    DuplicateDefinition(String),
}
