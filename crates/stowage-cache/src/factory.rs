//! Turns a [`StorageConfig`] into a ready [`CacheStorage`].

use crate::filesystem::FilesystemObjectStore;
use crate::remote::RemoteCacheStorage;
use crate::s3::S3ObjectStore;
use crate::skip::SkipStorage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage_core::{AzureBlobStorageOptions, CacheStorage, Error, Result, StorageConfig};
use tracing::info;

/// Builds storage backends for one working directory.
#[derive(Debug, Clone)]
pub struct StorageFactory {
    cwd: PathBuf,
    local_root: Option<PathBuf>,
}

impl StorageFactory {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            local_root: None,
        }
    }

    /// Directory for the `local` provider's objects.
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub async fn build(&self, config: StorageConfig) -> Result<Arc<dyn CacheStorage>> {
        info!(provider = config.provider(), cwd = %self.cwd.display(), "Creating cache storage");

        match config {
            StorageConfig::Local => {
                let root = match &self.local_root {
                    Some(root) => root.clone(),
                    None => FilesystemObjectStore::default_root()?,
                };
                let store = Arc::new(FilesystemObjectStore::new(root));
                Ok(Arc::new(RemoteCacheStorage::new(store, &self.cwd)))
            }
            StorageConfig::LocalSkip => Ok(Arc::new(SkipStorage)),
            StorageConfig::S3(options) => {
                let size_limit = options.size_limit();
                let store =
                    S3ObjectStore::from_config(&options.bucket, options.client_config.as_ref())
                        .await;
                let mut storage =
                    RemoteCacheStorage::new(Arc::new(store), &self.cwd).with_size_limit(size_limit);
                if let Some(prefix) = options.prefix {
                    storage = storage.with_prefix(prefix);
                }
                Ok(Arc::new(storage))
            }
            StorageConfig::AzureBlob(AzureBlobStorageOptions::Client { client, max_size }) => {
                Ok(Arc::new(
                    RemoteCacheStorage::new(client, &self.cwd)
                        .with_size_limit(max_size)
                        .with_name("azure-blob"),
                ))
            }
            StorageConfig::AzureBlob(AzureBlobStorageOptions::ConnectionString { .. }) => {
                Err(Error::ProviderNotLinked("azure-blob".into()))
            }
            StorageConfig::Npm(_) => Err(Error::ProviderNotLinked("npm".into())),
            StorageConfig::Custom(custom) => (custom.constructor)(self.cwd.as_path()),
        }
    }
}
