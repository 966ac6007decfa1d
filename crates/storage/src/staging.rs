use crate::error::StorageError;
use crate::location::{Scheme, SourceLocation};
use crate::read::map_fs_err;
use crate::store::ObjectStore;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tempfile::TempDir;
use tracing::debug;

/// Write-side staging for network-backed destinations.
///
/// Opening a file for write under an object-store destination creates it in
/// a private local directory keyed by the destination's parent path; `flush`
/// uploads everything staged under each key in one sweep and clears the
/// area. This batches the many small files a split produces into one bulk
/// transfer and keeps "open file" free of network calls. Local destinations
/// are written through directly.
///
/// The area lives for one run and is threaded through every write call.
pub struct StagingArea {
    root: TempDir,
    dirs: HashMap<String, PathBuf>,
}

impl StagingArea {
    pub fn new() -> Result<Self, StorageError> {
        Ok(StagingArea {
            root: tempfile::tempdir()?,
            dirs: HashMap::new(),
        })
    }

    /// Open `dest` for writing. Remote destinations are staged; local ones
    /// are created in place (with their parent directories).
    pub fn open_for_write(
        &mut self,
        dest: &SourceLocation,
    ) -> Result<Box<dyn Write + Send>, StorageError> {
        match dest.scheme() {
            Scheme::Local => {
                let path = PathBuf::from(dest.as_str());
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|err| map_fs_err(err, dest))?;
                    }
                }
                let file = File::create(&path).map_err(|err| map_fs_err(err, dest))?;
                Ok(Box::new(BufWriter::new(file)))
            }
            Scheme::S3 | Scheme::Gcs => {
                let parent = dest.parent().to_string();
                if parent.is_empty() {
                    return Err(StorageError::Other(format!(
                        "Incorrect bucket path {dest}"
                    )));
                }
                let dir = match self.dirs.get(&parent) {
                    Some(dir) => dir.clone(),
                    None => {
                        let dir = self.root.path().join(format!("d{}", self.dirs.len()));
                        std::fs::create_dir_all(&dir)?;
                        debug!(staging = %dir.display(), destination = %parent, "Created staging dir");
                        self.dirs.insert(parent, dir.clone());
                        dir
                    }
                };
                let file = File::create(dir.join(dest.file_name()))?;
                Ok(Box::new(BufWriter::new(file)))
            }
            other => Err(StorageError::UnsupportedBackend(format!(
                "{other:?} is not writable"
            ))),
        }
    }

    /// Number of files currently staged across all destinations.
    pub fn staged_file_count(&self) -> usize {
        self.dirs
            .values()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .map(|entries| entries.count())
            .sum()
    }

    /// Upload everything staged to its destination through the store and
    /// clear the area. Returns the number of uploaded files.
    pub async fn flush(&mut self, store: &dyn ObjectStore) -> Result<usize, StorageError> {
        let start = Instant::now();
        let mut uploaded = 0usize;
        let mut bytes = 0u64;
        for (parent, dir) in std::mem::take(&mut self.dirs) {
            let mut names: Vec<String> = std::fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_file())
                .map(|entry| entry.file_name().to_string_lossy().to_string())
                .collect();
            names.sort();
            for name in names {
                let body = tokio::fs::read(dir.join(&name)).await?;
                bytes += body.len() as u64;
                store
                    .put_object(&format!("{parent}/{name}"), body)
                    .await?;
                uploaded += 1;
            }
            std::fs::remove_dir_all(&dir)?;
        }
        debug!(
            files = uploaded,
            bytes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Flushed staging area"
        );
        Ok(uploaded)
    }

    /// Drop everything staged without uploading.
    pub fn discard(&mut self) {
        for (_, dir) in std::mem::take(&mut self.dirs) {
            let _ = std::fs::remove_dir_all(&dir);
        }
    }
}
