//! Error types for the audit trail

/// Audit errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The durable sink rejected or failed the write
    #[error("audit sink write failed: {0}")]
    SinkFailed(String),

    /// Metadata could not be serialized
    #[error("audit metadata serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
