//! Test context wiring a MinIO container to the cache.

use crate::containers::MinioContainer;
use std::path::Path;
use std::sync::Arc;
use stowage_cache::{RemoteCacheStorage, S3ObjectStore};
use stowage_core::{S3ClientConfig, S3Credentials, S3StorageOptions};

/// MinIO container with a fresh bucket.
///
/// Drop this to stop the container.
pub struct TestContext {
    pub minio: MinioContainer,
    pub bucket: String,
    pub store: Arc<S3ObjectStore>,
}

impl TestContext {
    /// Start MinIO and create a uniquely named bucket.
    pub async fn new() -> anyhow::Result<Self> {
        crate::init_test_logging();

        let minio = MinioContainer::start().await?;
        let bucket = format!("stowage-{}", uuid::Uuid::new_v4().simple());

        let client_config = client_config(&minio);
        let store = S3ObjectStore::from_config(&bucket, Some(&client_config)).await;
        store.client().create_bucket().bucket(&bucket).send().await?;

        Ok(Self {
            minio,
            bucket,
            store: Arc::new(store),
        })
    }

    /// Storage over the bucket for `cwd`.
    pub fn storage(&self, cwd: &Path) -> RemoteCacheStorage {
        RemoteCacheStorage::new(self.store.clone(), cwd)
    }

    /// Serializable options pointing at this context's bucket.
    pub fn s3_options(&self) -> S3StorageOptions {
        S3StorageOptions::new(&self.bucket).with_client_config(client_config(&self.minio))
    }

    pub fn minio_endpoint(&self) -> &str {
        self.minio.endpoint()
    }
}

fn client_config(minio: &MinioContainer) -> S3ClientConfig {
    S3ClientConfig {
        region: Some("us-east-1".to_string()),
        endpoint: Some(minio.endpoint().to_string()),
        force_path_style: Some(true),
        credentials: Some(S3Credentials {
            access_key_id: minio.access_key().to_string(),
            secret_access_key: minio.secret_key().to_string(),
            session_token: None,
        }),
    }
}
