//! Well-known locations under the results prefix.
//!
//! The results location is the only durable state shared between the
//! splitter, the submitter, and the reconciler, so the names below are part
//! of the on-disk/on-bucket contract.

/// Directory with run metadata, relative to the results location.
pub const METADATA_DIR: &str = "metadata";

/// Directory with sealed query batches, relative to the results location.
pub const QUERY_BATCH_DIR: &str = "query_batches";

pub const BATCH_FILE_PREFIX: &str = "batch_";
pub const BATCH_FILE_EXT: &str = "fa";

/// Ordered list of sealed batch files, one path per line, in seal order.
pub const MANIFEST_FILE: &str = "batch_list.txt";

/// Grand total of residues across all batches, as plain text.
pub const QUERY_LENGTH_FILE: &str = "query_length.txt";

/// Realized number of submitted jobs, as plain text. This is the
/// denominator used by reconciliation and must survive process restarts.
pub const NUM_JOBS_FILE: &str = "num_jobs_submitted.txt";

/// Serialized run configuration, written at submit time.
pub const RUN_CONFIG_FILE: &str = "run-config.json";

// Presence-only sentinels. Contents are advisory.
pub const SENTINEL_SUCCESS: &str = "SUCCESS.txt";
pub const SENTINEL_FAILURE: &str = "FAILURE.txt";
pub const SENTINEL_DONE: &str = "DONE.txt";

/// Join path segments under a results location without doubling separators.
pub fn join(base: &str, segments: &[&str]) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for segment in segments {
        out.push('/');
        out.push_str(segment.trim_matches('/'));
    }
    out
}

/// Full location of a metadata file under the results location.
pub fn metadata_file(results: &str, name: &str) -> String {
    join(results, &[METADATA_DIR, name])
}

/// Full location of the batch output directory under the results location.
pub fn batch_dir(results: &str) -> String {
    join(results, &[QUERY_BATCH_DIR])
}

/// Deterministic batch file name, ordinal zero-padded to at least 3 digits.
pub fn batch_file_name(ordinal: usize) -> String {
    format!("{BATCH_FILE_PREFIX}{ordinal:03}.{BATCH_FILE_EXT}")
}
