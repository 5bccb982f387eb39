//! Filesystem-backed object store for local development.

use crate::keys::encode_key;
use crate::pipe::CHUNK_SIZE;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use stowage_core::{ByteStream, Error, ObjectDescriptor, ObjectStore, RemoteObject, Result};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Object store that keeps each object as a single file under a root directory.
pub struct FilesystemObjectStore {
    root_dir: PathBuf,
}

impl FilesystemObjectStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Per-user cache directory used when no root is configured.
    pub fn default_root() -> Result<PathBuf> {
        directories::ProjectDirs::from("io", "stowage", "stowage")
            .map(|dirs| dirs.cache_dir().join("objects"))
            .ok_or_else(|| Error::Internal("Could not determine cache directory".into()))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(encode_key(key))
    }

    async fn write_body(&self, path: &Path, mut body: ByteStream) -> Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn get_object(&self, key: &str) -> Result<Option<RemoteObject>> {
        let path = self.key_path(key);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;

        let body = ReaderStream::with_capacity(file, CHUNK_SIZE).map(|r| r.map_err(Error::from));
        Ok(Some(RemoteObject {
            descriptor: ObjectDescriptor {
                content_length: Some(metadata.len()),
            },
            body: Box::pin(body),
        }))
    }

    async fn put_object(&self, key: &str, _content_type: &str, body: ByteStream) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await.map_err(|e| {
            Error::Internal(format!("Failed to create cache dir: {}", e))
        })?;

        // Readers never observe a partially written object.
        let file_name = encode_key(key);
        let partial = self
            .root_dir
            .join(format!(".{}.{}.partial", file_name, uuid::Uuid::new_v4()));

        match self.write_body(&partial, body).await {
            Ok(()) => {
                tokio::fs::rename(&partial, self.root_dir.join(&file_name)).await?;
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}
