use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::S3Config;

/// StorageError
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object storage error: {0}")]
    Backend(String),
}

/// object_key
///
/// Storage key for a newly uploaded file: `<prefix>/<uuid>_<filename>`. The filename must
/// already be sanitized; the random part keeps uploads with the same name apart.
pub fn object_key(prefix: &str, filename: &str) -> String {
    format!("{}/{}_{}", prefix.trim_matches('/'), Uuid::new_v4(), filename)
}

/// StorageService
///
/// Object storage for validated uploads. Keys are relative, `/`-separated paths as produced
/// by [`object_key`].
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Prepares the backend (bucket or directory). Safe to call repeatedly.
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError>;

    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Removes an object. Deleting a missing object is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Absolute URL the object can be fetched from.
    fn public_url(&self, key: &str) -> String;
}

/// StorageState
///
/// Shared handle to the storage backend.
pub type StorageState = Arc<dyn StorageService>;

fn checked_key(key: &str) -> Result<&Path, StorageError> {
    let path = Path::new(key);
    let plain = !key.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(path)
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// LocalStorage
///
/// Writes objects under the media root so the media gatekeeper can serve them from
/// `/media/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> Result<(), StorageError> {
        let path = self.root.join(checked_key(key)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;
        tracing::debug!(key, bytes = body.len(), "Stored object on local disk");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let path = self.root.join(checked_key(key)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/media/{}", self.base_url, key)
    }
}

/// S3StorageClient
///
/// S3-compatible backend (MinIO, Supabase Storage, AWS). Path-style addressing is forced
/// for MinIO and Supabase compatibility.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_url: String,
}

impl S3StorageClient {
    pub fn new(config: &S3Config) -> Self {
        let credentials = s3::config::Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let s3_config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .region(s3::config::Region::new(config.region.clone()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
            bucket_name: config.bucket.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// ensure_bucket_exists
    ///
    /// CreateBucket is idempotent for our purposes: "already owned" answers are ignored.
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        if let Err(e) = self.client.create_bucket().bucket(&self.bucket_name).send().await {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "CreateBucket skipped");
        }
        Ok(())
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        checked_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .body(s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        checked_key(key)?;
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

/// MockStorageService
///
/// In-memory `StorageService` for tests. Records stored objects and can be told to fail
/// every write.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    objects: Arc<Mutex<BTreeMap<String, (Bytes, String)>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys currently stored, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    /// Body and content type of a stored object.
    pub async fn object(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend("Mock Storage Error: Simulation requested".into()));
        }
        checked_key(key)?;
        self.objects
            .lock()
            .await
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend("Mock Storage Error: Simulation requested".into()));
        }
        self.objects.lock().await.remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://localhost:8000/media/{key}")
    }
}
