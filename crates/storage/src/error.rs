use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The location does not exist on its backend.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused the operation for authorization reasons.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Content could not be decoded as text, usually a missing or spurious
    /// compression suffix.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Malformed or truncated archive.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The scheme is recognized but not wired to an implementation.
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// HTTP-level failure talking to a remote backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    /// Classify an HTTP status from a remote backend into the error
    /// taxonomy, attributing it to `location`.
    pub fn from_status(status: reqwest::StatusCode, location: &str) -> StorageError {
        match status.as_u16() {
            404 => StorageError::NotFound(location.to_string()),
            401 | 403 => StorageError::PermissionDenied(location.to_string()),
            code => StorageError::Other(format!("{location}: HTTP status {code}")),
        }
    }
}
