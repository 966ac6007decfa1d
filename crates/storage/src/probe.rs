use crate::error::StorageError;
use crate::location::{Scheme, SourceLocation};
use crate::read::{RemoteConfig, map_fs_err};
use rand::Rng;
use tracing::debug;

fn probe_file_name() -> String {
    let mut rng = rand::rng();
    let digits: String = (0..10).map(|_| rng.random_range(0..10).to_string()).collect();
    format!(".seqferry-probe-{digits}")
}

fn head(url: &str, remote: &RemoteConfig) -> Result<reqwest::blocking::Response, StorageError> {
    let client = reqwest::blocking::Client::new();
    let mut req = client.head(url);
    if let Some(token) = &remote.token {
        req = req.bearer_auth(token);
    }
    let resp = req.send()?;
    if !resp.status().is_success() {
        return Err(StorageError::from_status(resp.status(), url));
    }
    Ok(resp)
}

/// Lightweight existence probe: a metadata call, never a full read.
pub fn check_readable(
    location: &SourceLocation,
    remote: &RemoteConfig,
) -> Result<(), StorageError> {
    debug!(location = %location, "Probing for read");
    match location.scheme() {
        Scheme::Local => {
            std::fs::metadata(location.as_str()).map_err(|err| map_fs_err(err, location))?;
            Ok(())
        }
        Scheme::Http => {
            head(location.as_str(), remote)?;
            Ok(())
        }
        Scheme::S3 | Scheme::Gcs => {
            head(&remote.object_url(location)?, remote)?;
            Ok(())
        }
        Scheme::Ftp | Scheme::Azure => Err(StorageError::UnsupportedBackend(format!(
            "no probe for {location}"
        ))),
    }
}

/// Size of the object behind a location, without reading it.
pub fn content_length(
    location: &SourceLocation,
    remote: &RemoteConfig,
) -> Result<u64, StorageError> {
    match location.scheme() {
        Scheme::Local => {
            let meta =
                std::fs::metadata(location.as_str()).map_err(|err| map_fs_err(err, location))?;
            Ok(meta.len())
        }
        Scheme::Http | Scheme::S3 | Scheme::Gcs => {
            let url = match location.scheme() {
                Scheme::Http => location.as_str().to_string(),
                _ => remote.object_url(location)?,
            };
            let resp = head(&url, remote)?;
            resp.headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .ok_or_else(|| {
                    StorageError::NotFound(format!("Length is not available for {location}"))
                })
        }
        Scheme::Ftp | Scheme::Azure => Err(StorageError::UnsupportedBackend(format!(
            "no probe for {location}"
        ))),
    }
}

/// Probe that a directory-like location accepts writes, by writing and
/// removing a throwaway file. Fails with `PermissionDenied` if it cannot.
pub fn check_writable(directory: &SourceLocation, remote: &RemoteConfig) -> Result<(), StorageError> {
    let probe = probe_file_name();
    debug!(directory = %directory, probe = %probe, "Probing for write");
    match directory.scheme() {
        Scheme::Local => {
            let path = std::path::Path::new(directory.as_str()).join(&probe);
            std::fs::write(&path, b"probe").map_err(|err| {
                StorageError::PermissionDenied(format!("{directory}: {err}"))
            })?;
            std::fs::remove_file(&path).map_err(|err| {
                StorageError::PermissionDenied(format!("{directory}: {err}"))
            })?;
            Ok(())
        }
        Scheme::S3 | Scheme::Gcs => {
            let probe_loc =
                SourceLocation::resolve(&format!("{}/{probe}", directory.as_str().trim_end_matches('/')));
            let url = remote.object_url(&probe_loc)?;
            let client = reqwest::blocking::Client::new();
            let mut put = client.put(&url).body(b"probe".to_vec());
            if let Some(token) = &remote.token {
                put = put.bearer_auth(token);
            }
            let resp = put.send()?;
            if !resp.status().is_success() {
                return Err(StorageError::PermissionDenied(format!(
                    "{directory}: HTTP status {}",
                    resp.status()
                )));
            }
            let mut del = client.delete(&url);
            if let Some(token) = &remote.token {
                del = del.bearer_auth(token);
            }
            let _ = del.send();
            Ok(())
        }
        Scheme::Http | Scheme::Ftp | Scheme::Azure => Err(StorageError::UnsupportedBackend(
            format!("{directory} is not writable"),
        )),
    }
}
