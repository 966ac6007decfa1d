//! The single place where error kinds become process exit codes.

use crate::error::CliError;
use splitter::SplitError;
use storage::StorageError;

pub const EXIT_OK: i32 = 0;
pub const EXIT_GENERIC: i32 = 1;

fn storage_code(err: &StorageError) -> i32 {
    match err {
        StorageError::NotFound(_) => 2,
        StorageError::PermissionDenied(_) => 3,
        StorageError::Decode(_) => 4,
        StorageError::Io(_) | StorageError::Http(_) => 5,
        StorageError::Archive(_) => 6,
        StorageError::UnsupportedBackend(_) => 7,
        StorageError::Other(_) => 8,
    }
}

/// Exit code space of the splitter: distinct codes per input-error kind,
/// 8 for empty input and anything else.
pub fn split_code(err: &CliError) -> i32 {
    match err {
        CliError::Split(SplitError::EmptyInput) => 8,
        CliError::Split(SplitError::Storage(err)) => storage_code(err),
        CliError::Split(SplitError::Io(_)) => 5,
        CliError::Storage(err) => storage_code(err),
        CliError::Io(_) => 5,
        _ => 8,
    }
}
