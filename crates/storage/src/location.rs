use crate::error::StorageError;

pub const S3_PREFIX: &str = "s3://";
pub const GCS_PREFIX: &str = "gs://";
pub const AZURE_PREFIX: &str = "az://";
pub const FTP_PREFIX: &str = "ftp://";

/// Storage backend a location resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Local,
    S3,
    Gcs,
    Http,
    /// Recognized but not wired to an implementation.
    Ftp,
    /// Recognized but not wired to an implementation.
    Azure,
}

/// Compression or archive format inferred from the location suffix.
///
/// Archive formats merge every contained regular file into one logical
/// stream, in member order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    Plain,
    Gzip,
    Tar,
    TarGz,
}

/// A resolved input or output location. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    raw: String,
    scheme: Scheme,
    packing: Packing,
}

impl SourceLocation {
    pub fn resolve(raw: &str) -> SourceLocation {
        let scheme = if raw.starts_with(S3_PREFIX) {
            Scheme::S3
        } else if raw.starts_with(GCS_PREFIX) {
            Scheme::Gcs
        } else if raw.starts_with(AZURE_PREFIX) {
            Scheme::Azure
        } else if raw.starts_with(FTP_PREFIX) {
            Scheme::Ftp
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            Scheme::Http
        } else {
            Scheme::Local
        };
        let packing = if raw.ends_with(".tar.gz") || raw.ends_with(".tgz") {
            Packing::TarGz
        } else if raw.ends_with(".tar") {
            Packing::Tar
        } else if raw.ends_with(".gz") {
            Packing::Gzip
        } else {
            Packing::Plain
        };
        SourceLocation {
            raw: raw.to_string(),
            scheme,
            packing,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn packing(&self) -> Packing {
        self.packing
    }

    pub fn is_remote(&self) -> bool {
        self.scheme != Scheme::Local
    }

    /// Everything up to the last `/`, or empty for a bare file name.
    pub fn parent(&self) -> &str {
        match self.raw.rfind('/') {
            Some(idx) => &self.raw[..idx],
            None => "",
        }
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        match self.raw.rfind('/') {
            Some(idx) => &self.raw[idx + 1..],
            None => &self.raw,
        }
    }

    /// Split an object-store location into bucket and key. The scheme
    /// prefix is optional, so both `s3://bucket/a/b` and `bucket/a/b`
    /// yield `("bucket", "a/b")`.
    pub fn bucket_and_key(&self) -> Result<(&str, &str), StorageError> {
        let bare = self
            .raw
            .strip_prefix(S3_PREFIX)
            .or_else(|| self.raw.strip_prefix(GCS_PREFIX))
            .unwrap_or(&self.raw);
        match bare.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() => Ok((bucket, key)),
            _ => Err(StorageError::Other(format!(
                "Incorrect bucket path {}",
                self.raw
            ))),
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_resolution() {
        assert_eq!(SourceLocation::resolve("/tmp/in.fa").scheme(), Scheme::Local);
        assert_eq!(SourceLocation::resolve("s3://b/k.fa").scheme(), Scheme::S3);
        assert_eq!(SourceLocation::resolve("gs://b/k.fa").scheme(), Scheme::Gcs);
        assert_eq!(
            SourceLocation::resolve("https://host/x.fa").scheme(),
            Scheme::Http
        );
        assert_eq!(
            SourceLocation::resolve("ftp://host/x.fa").scheme(),
            Scheme::Ftp
        );
        assert_eq!(
            SourceLocation::resolve("az://container/x.fa").scheme(),
            Scheme::Azure
        );
    }

    #[test]
    fn test_packing_resolution() {
        assert_eq!(SourceLocation::resolve("x.fa").packing(), Packing::Plain);
        assert_eq!(SourceLocation::resolve("x.fa.gz").packing(), Packing::Gzip);
        assert_eq!(SourceLocation::resolve("x.tar").packing(), Packing::Tar);
        assert_eq!(SourceLocation::resolve("x.tar.gz").packing(), Packing::TarGz);
        assert_eq!(SourceLocation::resolve("x.tgz").packing(), Packing::TarGz);
    }

    #[test]
    fn test_bucket_and_key() {
        let loc = SourceLocation::resolve("s3://test-bucket/path/file.fa");
        assert_eq!(loc.bucket_and_key().unwrap(), ("test-bucket", "path/file.fa"));
        let bare = SourceLocation::resolve("test-bucket/file.fa");
        assert_eq!(bare.bucket_and_key().unwrap(), ("test-bucket", "file.fa"));
    }

    #[test]
    fn test_parent_and_file_name() {
        let loc = SourceLocation::resolve("gs://bucket/dir/batch_000.fa");
        assert_eq!(loc.parent(), "gs://bucket/dir");
        assert_eq!(loc.file_name(), "batch_000.fa");
    }
}
