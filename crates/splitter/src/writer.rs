use crate::error::SplitError;
use model::paths;
use std::io::Write;
use storage::{SourceLocation, StagingArea};
use tracing::debug;

/// Persists sealed batches under deterministic, monotonically increasing
/// names and keeps the manifest in seal order.
pub struct BatchWriter<'a> {
    staging: &'a mut StagingArea,
    out_dir: String,
    next_ordinal: usize,
    manifest: Vec<String>,
}

impl<'a> BatchWriter<'a> {
    pub fn new(staging: &'a mut StagingArea, out_dir: &str) -> Self {
        BatchWriter {
            staging,
            out_dir: out_dir.trim_end_matches('/').to_string(),
            next_ordinal: 0,
            manifest: Vec::new(),
        }
    }

    /// Write one sealed batch, returning its fully-qualified name.
    pub fn seal(&mut self, lines: &[String]) -> Result<String, SplitError> {
        let name = paths::batch_file_name(self.next_ordinal);
        let fqn = paths::join(&self.out_dir, &[name.as_str()]);
        let dest = SourceLocation::resolve(&fqn);
        let mut writer = self.staging.open_for_write(&dest)?;
        for line in lines {
            writer.write_all(line.as_bytes())?;
        }
        writer.flush()?;
        debug!(batch = %fqn, lines = lines.len(), "Sealed batch");
        self.next_ordinal += 1;
        self.manifest.push(fqn.clone());
        Ok(fqn)
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }
}
