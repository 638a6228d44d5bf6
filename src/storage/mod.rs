//! Object storage abstraction.
//!
//! Provides a unified interface for reading and writing table data on S3
//! or the local filesystem. URLs are dispatched to a backend by pattern;
//! all paths handed to callers are relative to the configured prefix, so
//! `list` results can be passed straight back to `get`.

mod local;
mod s3;

use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use regex::Regex;
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};

pub use local::LocalConfig;
pub use s3::S3Config;

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over the supported backends.
#[derive(Clone)]
pub struct StorageProvider {
    config: BackendConfig,
    object_store: Arc<dyn ObjectStore>,
    canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

// URL patterns for the supported storage backends
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum Backend {
    S3,
    Local,
}

fn matchers() -> &'static Vec<(Backend, Regex)> {
    static MATCHERS: OnceLock<Vec<(Backend, Regex)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        vec![
            (Backend::S3, Regex::new(S3_URL).unwrap()),
            (Backend::S3, Regex::new(S3_PATH).unwrap()),
            (Backend::Local, Regex::new(FILE_URI).unwrap()),
            (Backend::Local, Regex::new(FILE_PATH).unwrap()),
        ]
    })
}

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        for (backend, regex) in matchers() {
            if let Some(matches) = regex.captures(url) {
                return match backend {
                    Backend::S3 => Self::parse_s3(matches),
                    Backend::Local => Self::parse_local(matches),
                };
            }
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_s3(matches: regex::Captures) -> Result<Self, StorageError> {
        let bucket = matches
            .name("bucket")
            .expect("bucket should always be available")
            .as_str()
            .to_string();

        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| matches.name("region").map(|m| m.as_str().to_string()));

        let endpoint = std::env::var("AWS_ENDPOINT").ok();

        let key = matches.name("key").map(|m| m.as_str().into());

        Ok(BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket,
            key,
        }))
    }

    fn parse_local(matches: regex::Captures) -> Result<Self, StorageError> {
        let path = matches
            .name("path")
            .expect("path regex must contain a path group")
            .as_str();

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Ok(BackendConfig::Local(LocalConfig { path }))
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Local(_) => None,
        }
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;

        match config {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
        }
    }

    pub(crate) fn from_parts(
        config: BackendConfig,
        object_store: Arc<dyn ObjectStore>,
        canonical_url: String,
    ) -> Self {
        Self {
            config,
            object_store,
            canonical_url,
        }
    }

    /// List files, optionally under an additional prefix.
    ///
    /// Returned paths are relative to the configured base prefix and
    /// include the additional prefix, so partition directories survive in
    /// the result. Missing prefixes yield an empty listing.
    pub async fn list_files(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let base_parts = self
            .config
            .key()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        let full_prefix: Option<Path> = match (self.config.key(), prefix) {
            (Some(key), Some(extra)) => {
                Some(key.parts().chain(Path::from(extra).parts()).collect())
            }
            (Some(key), None) => Some(key.to_string().into()),
            (None, Some(extra)) => Some(Path::from(extra)),
            (None, None) => None,
        };

        let mut stream = self.object_store.list(full_prefix.as_ref());
        let mut files = Vec::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(meta) => {
                    let relative: Path = meta.location.parts().skip(base_parts).collect();
                    files.push(relative.to_string());
                }
                // A prefix that does not exist is just an empty listing
                Err(object_store::Error::NotFound { .. }) => continue,
                Err(source) => return Err(StorageError::ObjectStore { source }),
            }
        }

        files.sort();
        Ok(files)
    }

    /// Get the contents of a file.
    pub async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let path = Path::from(path);
        let result = self
            .object_store
            .get(&self.qualify_path(&path))
            .await
            .context(ObjectStoreSnafu)?;
        result.bytes().await.context(ObjectStoreSnafu)
    }

    /// Put bytes to a path.
    pub async fn put(&self, path: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = Path::from(path);
        self.object_store
            .put(&self.qualify_path(&path), PutPayload::from(bytes))
            .await
            .context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Qualify a path with the configured key prefix.
    fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Canonical URL of this provider (for logging).
    pub fn url(&self) -> &str {
        &self.canonical_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_url_parsing() {
        let config = BackendConfig::parse_url("s3://mybucket/path/to/data").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, Some(Path::from("path/to/data")));
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_s3_url_without_key() {
        let config = BackendConfig::parse_url("s3://mybucket").unwrap();
        match config {
            BackendConfig::S3(s3) => {
                assert_eq!(s3.bucket, "mybucket");
                assert_eq!(s3.key, None);
            }
            _ => panic!("Expected S3 config"),
        }
    }

    #[test]
    fn test_local_path_parsing() {
        let config = BackendConfig::parse_url("/local/path/to/data").unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.path, "/local/path/to/data");
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_file_uri_parsing() {
        let config = BackendConfig::parse_url("file:///local/path").unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.path, "/local/path");
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = BackendConfig::parse_url("ftp://nope").unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_list_returns_relative_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let base = temp_dir.path();

        let nested = base.join("region=us");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("a.csv"), b"x").unwrap();
        std::fs::write(nested.join("b.csv"), b"y").unwrap();

        let storage =
            StorageProvider::for_url_with_options(base.to_str().unwrap(), HashMap::new())
                .await
                .unwrap();

        let files = storage.list_files(None).await.unwrap();
        assert_eq!(files, vec!["region=us/a.csv", "region=us/b.csv"]);

        // Round-trip: listed paths work with get()
        for file in &files {
            let content = storage.get(file).await.unwrap();
            assert!(!content.is_empty());
        }
    }

    #[tokio::test]
    async fn test_list_with_prefix_keeps_prefix_in_result() {
        let temp_dir = tempfile::tempdir().unwrap();
        let base = temp_dir.path();

        for region in ["ca", "us"] {
            let dir = base.join(format!("region={region}"));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("videos.csv"), b"x").unwrap();
        }

        let storage =
            StorageProvider::for_url_with_options(base.to_str().unwrap(), HashMap::new())
                .await
                .unwrap();

        let files = storage.list_files(Some("region=ca")).await.unwrap();
        assert_eq!(files, vec!["region=ca/videos.csv"]);
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = StorageProvider::for_url_with_options(
            temp_dir.path().to_str().unwrap(),
            HashMap::new(),
        )
        .await
        .unwrap();

        let files = storage.list_files(Some("region=de")).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = StorageProvider::for_url_with_options(
            temp_dir.path().to_str().unwrap(),
            HashMap::new(),
        )
        .await
        .unwrap();

        storage
            .put("region=us/data.parquet", Bytes::from_static(b"parquet"))
            .await
            .unwrap();
        let content = storage.get("region=us/data.parquet").await.unwrap();
        assert_eq!(content.as_ref(), b"parquet");
    }
}
