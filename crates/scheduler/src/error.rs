use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Bulk-apply of a descriptor group failed.
    #[error("Failed to apply job descriptors: {0}")]
    Apply(String),

    /// A scheduler query failed. Transient from the caller's point of
    /// view: no run phase may be inferred from it.
    #[error("Scheduler query failed: {0}")]
    Query(String),

    #[error("Failed to scale worker pool: {0}")]
    Scale(String),

    #[error("Failed to parse scheduler output: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
