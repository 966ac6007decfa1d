use crate::error::StorageError;
use crate::line_source::{ArchiveLineSource, BufferedLineSource, ReadableLineSource};
use crate::location::{Packing, Scheme, SourceLocation};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use tracing::debug;

/// Endpoint configuration for the object-store and HTTP collaborators.
/// Credential acquisition is outside this crate; a pre-acquired bearer
/// token is accepted from the environment.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub s3_endpoint: String,
    pub gcs_endpoint: String,
    pub token: Option<String>,
}

pub const DFLT_S3_ENDPOINT: &str = "https://s3.amazonaws.com";
pub const DFLT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            s3_endpoint: DFLT_S3_ENDPOINT.to_string(),
            gcs_endpoint: DFLT_GCS_ENDPOINT.to_string(),
            token: None,
        }
    }
}

impl RemoteConfig {
    pub fn from_env() -> Self {
        RemoteConfig {
            s3_endpoint: std::env::var("SEQFERRY_S3_ENDPOINT")
                .unwrap_or_else(|_| DFLT_S3_ENDPOINT.to_string()),
            gcs_endpoint: std::env::var("SEQFERRY_GCS_ENDPOINT")
                .unwrap_or_else(|_| DFLT_GCS_ENDPOINT.to_string()),
            token: std::env::var("SEQFERRY_STORAGE_TOKEN").ok(),
        }
    }

    /// Endpoint-addressed URL for an object-store location.
    pub fn object_url(&self, location: &SourceLocation) -> Result<String, StorageError> {
        let endpoint = match location.scheme() {
            Scheme::S3 => &self.s3_endpoint,
            Scheme::Gcs => &self.gcs_endpoint,
            other => {
                return Err(StorageError::UnsupportedBackend(format!(
                    "{other:?} is not an object store"
                )));
            }
        };
        let (bucket, key) = location.bucket_and_key()?;
        Ok(format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')))
    }
}

/// Open the raw byte stream behind a location, before any decompression.
fn open_raw_reader(
    location: &SourceLocation,
    remote: &RemoteConfig,
) -> Result<Box<dyn Read + Send>, StorageError> {
    match location.scheme() {
        Scheme::Local => {
            let file = File::open(location.as_str()).map_err(|err| map_fs_err(err, location))?;
            Ok(Box::new(file))
        }
        Scheme::Http => Ok(Box::new(blocking_get(location.as_str(), remote)?)),
        Scheme::S3 | Scheme::Gcs => {
            let url = remote.object_url(location)?;
            Ok(Box::new(blocking_get(&url, remote)?))
        }
        Scheme::Ftp | Scheme::Azure => Err(StorageError::UnsupportedBackend(format!(
            "no reader for {}",
            location
        ))),
    }
}

pub(crate) fn map_fs_err(err: std::io::Error, location: &SourceLocation) -> StorageError {
    match err.kind() {
        std::io::ErrorKind::NotFound => StorageError::NotFound(location.to_string()),
        std::io::ErrorKind::PermissionDenied => {
            StorageError::PermissionDenied(location.to_string())
        }
        _ => StorageError::Io(err),
    }
}

pub(crate) fn blocking_get(
    url: &str,
    remote: &RemoteConfig,
) -> Result<reqwest::blocking::Response, StorageError> {
    let client = reqwest::blocking::Client::new();
    let mut req = client.get(url);
    if let Some(token) = &remote.token {
        req = req.bearer_auth(token);
    }
    let resp = req.send()?;
    if !resp.status().is_success() {
        return Err(StorageError::from_status(resp.status(), url));
    }
    Ok(resp)
}

/// Open a location as a logical line stream, composing decompression and
/// archive-merge from the detected suffix.
pub fn open_line_source(
    location: &SourceLocation,
    remote: &RemoteConfig,
) -> Result<Box<dyn ReadableLineSource>, StorageError> {
    debug!(location = %location, packing = ?location.packing(), "Opening for read");
    let raw = open_raw_reader(location, remote)?;
    let source: Box<dyn ReadableLineSource> = match location.packing() {
        Packing::Plain => Box::new(BufferedLineSource::new(BufReader::new(raw))),
        Packing::Gzip => Box::new(BufferedLineSource::new(BufReader::new(GzDecoder::new(raw)))),
        Packing::Tar => Box::new(ArchiveLineSource::new(raw)),
        Packing::TarGz => Box::new(ArchiveLineSource::new(GzDecoder::new(raw))),
    };
    Ok(source)
}
