use crate::error::StorageError;
use crate::location::{GCS_PREFIX, S3_PREFIX, Scheme, SourceLocation};
use crate::read::RemoteConfig;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
}

/// The object-store collaborator. Implementations parse the bucket/key out
/// of the full location themselves, so callers pass locations around as
/// plain strings.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, location: &str) -> Result<Vec<u8>, StorageError>;
    async fn put_object(&self, location: &str, body: Vec<u8>) -> Result<(), StorageError>;
    async fn head_object(&self, location: &str) -> Result<ObjectMeta, StorageError>;
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError>;

    /// Existence check on top of `head_object`; only `NotFound` is treated
    /// as a negative answer, other failures propagate.
    async fn exists(&self, location: &str) -> Result<bool, StorageError> {
        match self.head_object(location).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Pick the store implementation matching a results location.
pub fn store_for(
    location: &SourceLocation,
    remote: RemoteConfig,
) -> Result<Box<dyn ObjectStore>, StorageError> {
    match location.scheme() {
        Scheme::Local => Ok(Box::new(LocalStore)),
        Scheme::S3 | Scheme::Gcs => Ok(Box::new(HttpObjectStore::new(remote))),
        other => Err(StorageError::UnsupportedBackend(format!(
            "{other:?} cannot hold results"
        ))),
    }
}

/// S3-compatible REST client over plain HTTP: endpoint-addressed buckets,
/// optional bearer token, list via `list-type=2`.
pub struct HttpObjectStore {
    client: reqwest::Client,
    remote: RemoteConfig,
}

impl HttpObjectStore {
    pub fn new(remote: RemoteConfig) -> Self {
        HttpObjectStore {
            client: reqwest::Client::new(),
            remote,
        }
    }

    fn url_for(&self, location: &str) -> Result<String, StorageError> {
        self.remote.object_url(&SourceLocation::resolve(location))
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.remote.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

/// Pull every `<Key>` element out of a ListObjectsV2 response body.
fn extract_keys(xml: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<Key>") {
        rest = &rest[start + "<Key>".len()..];
        if let Some(end) = rest.find("</Key>") {
            keys.push(rest[..end].to_string());
            rest = &rest[end..];
        } else {
            break;
        }
    }
    keys
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.url_for(location)?;
        let resp = self.authorized(self.client.get(&url)).send().await?;
        if !resp.status().is_success() {
            return Err(StorageError::from_status(resp.status(), location));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn put_object(&self, location: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let url = self.url_for(location)?;
        let resp = self
            .authorized(self.client.put(&url))
            .body(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StorageError::from_status(resp.status(), location));
        }
        Ok(())
    }

    async fn head_object(&self, location: &str) -> Result<ObjectMeta, StorageError> {
        let url = self.url_for(location)?;
        let resp = self.authorized(self.client.head(&url)).send().await?;
        if !resp.status().is_success() {
            return Err(StorageError::from_status(resp.status(), location));
        }
        let size = resp
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(ObjectMeta { size })
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let loc = SourceLocation::resolve(prefix);
        let (bucket, key) = loc.bucket_and_key()?;
        let scheme_prefix = if prefix.starts_with(GCS_PREFIX) {
            GCS_PREFIX
        } else {
            S3_PREFIX
        };
        let endpoint = match loc.scheme() {
            Scheme::Gcs => &self.remote.gcs_endpoint,
            _ => &self.remote.s3_endpoint,
        };
        let url = format!(
            "{}/{bucket}?list-type=2&prefix={key}",
            endpoint.trim_end_matches('/')
        );
        let resp = self.authorized(self.client.get(&url)).send().await?;
        if !resp.status().is_success() {
            return Err(StorageError::from_status(resp.status(), prefix));
        }
        let body = resp.text().await?;
        Ok(extract_keys(&body)
            .into_iter()
            .map(|key| format!("{scheme_prefix}{bucket}/{key}"))
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        for location in self.list_prefix(prefix).await? {
            let url = self.url_for(&location)?;
            let resp = self.authorized(self.client.delete(&url)).send().await?;
            if !resp.status().is_success() && resp.status().as_u16() != 404 {
                return Err(StorageError::from_status(resp.status(), &location));
            }
        }
        debug!(prefix = %prefix, "Deleted prefix");
        Ok(())
    }
}

/// Object store over the local filesystem; locations are plain paths.
/// Doubles as the file-based backend in tests and local runs.
pub struct LocalStore;

impl LocalStore {
    fn map_err(err: std::io::Error, location: &str) -> StorageError {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(location.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StorageError::PermissionDenied(location.to_string())
            }
            _ => StorageError::Io(err),
        }
    }

    fn matching_paths(prefix: &str) -> Result<Vec<PathBuf>, StorageError> {
        let (dir, name_prefix) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => (".", prefix),
        };
        let mut paths = Vec::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(err) => return Err(Self::map_err(err, prefix)),
        };
        for entry in entries {
            let entry = entry.map_err(StorageError::Io)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(name_prefix) {
                paths.push(Path::new(dir).join(name));
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get_object(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(location)
            .await
            .map_err(|err| Self::map_err(err, location))
    }

    async fn put_object(&self, location: &str, body: Vec<u8>) -> Result<(), StorageError> {
        if let Some(parent) = Path::new(location).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| Self::map_err(err, location))?;
        }
        tokio::fs::write(location, body)
            .await
            .map_err(|err| Self::map_err(err, location))
    }

    async fn head_object(&self, location: &str) -> Result<ObjectMeta, StorageError> {
        let meta = tokio::fs::metadata(location)
            .await
            .map_err(|err| Self::map_err(err, location))?;
        Ok(ObjectMeta { size: meta.len() })
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir_form = format!("{}/", prefix.trim_end_matches('/'));
        if Path::new(prefix).is_dir() {
            return Self::matching_paths(&dir_form).map(|paths| {
                paths
                    .into_iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect()
            });
        }
        Ok(Self::matching_paths(prefix)?
            .into_iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        if Path::new(prefix).is_dir() {
            return tokio::fs::remove_dir_all(prefix)
                .await
                .map_err(|err| Self::map_err(err, prefix));
        }
        for path in Self::matching_paths(prefix)? {
            if path.is_dir() {
                tokio::fs::remove_dir_all(&path)
                    .await
                    .map_err(|err| Self::map_err(err, prefix))?;
            } else {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|err| Self::map_err(err, prefix))?;
            }
        }
        Ok(())
    }
}

/// In-memory store keyed by full location. Backs the collaborator in unit
/// tests where no filesystem or network should be touched.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn insert(&self, location: &str, body: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(location.to_string(), body.to_vec());
    }

    pub fn contains(&self, location: &str) -> bool {
        self.objects.lock().unwrap().contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(location.to_string()))
    }

    async fn put_object(&self, location: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .insert(location.to_string(), body);
        Ok(())
    }

    async fn head_object(&self, location: &str) -> Result<ObjectMeta, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(location)
            .map(|body| ObjectMeta {
                size: body.len() as u64,
            })
            .ok_or_else(|| StorageError::NotFound(location.to_string()))
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store
            .put_object("s3://b/metadata/x.txt", b"42".to_vec())
            .await
            .unwrap();
        assert!(store.exists("s3://b/metadata/x.txt").await.unwrap());
        assert!(!store.exists("s3://b/metadata/y.txt").await.unwrap());
        assert_eq!(store.get_object("s3://b/metadata/x.txt").await.unwrap(), b"42");
        assert_eq!(
            store.head_object("s3://b/metadata/x.txt").await.unwrap().size,
            2
        );
    }

    #[tokio::test]
    async fn test_memory_store_prefix_ops() {
        let store = MemoryStore::new();
        store.insert("s3://b/q/batch_000.fa", b"a");
        store.insert("s3://b/q/batch_001.fa", b"b");
        store.insert("s3://b/metadata/m.txt", b"m");
        let listed = store.list_prefix("s3://b/q/batch_").await.unwrap();
        assert_eq!(listed.len(), 2);
        store.delete_prefix("s3://b/q/").await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_local_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore;
        let loc = dir.path().join("metadata/n.txt");
        let loc = loc.to_str().unwrap();
        store.put_object(loc, b"7".to_vec()).await.unwrap();
        assert_eq!(store.get_object(loc).await.unwrap(), b"7");
        assert!(store.exists(loc).await.unwrap());
        match store.get_object(&format!("{loc}.missing")).await {
            Err(StorageError::NotFound(_)) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_store_list_and_delete_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore;
        let base = dir.path().join("q");
        for i in 0..3 {
            store
                .put_object(
                    base.join(format!("batch_{i:03}.fa")).to_str().unwrap(),
                    vec![b'x'],
                )
                .await
                .unwrap();
        }
        let prefix = format!("{}/batch_", base.to_str().unwrap());
        let listed = store.list_prefix(&prefix).await.unwrap();
        assert_eq!(listed.len(), 3);
        store.delete_prefix(base.to_str().unwrap()).await.unwrap();
        assert!(!base.exists());
    }

    #[test]
    fn test_extract_keys() {
        let xml = "<ListBucketResult><Contents><Key>a/b.fa</Key></Contents>\
                   <Contents><Key>a/c.fa</Key></Contents></ListBucketResult>";
        assert_eq!(extract_keys(xml), vec!["a/b.fa", "a/c.fa"]);
    }
}
