use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplitError {
    /// No lines were read across all provided sources. Distinct from a
    /// missing file, which surfaces as `Storage(NotFound)`.
    #[error("Empty input: no lines read from any source")]
    EmptyInput,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
