//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the cache core and the
//! storage adapters plugged into it.

use crate::{CacheKey, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::path::PathBuf;
use std::pin::Pin;

/// Stream of archive bytes moving between pipeline stages.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Metadata reported by the store before the body is consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Declared content length, when the store knows it up front.
    pub content_length: Option<u64>,
}

/// An object opened for reading.
pub struct RemoteObject {
    pub descriptor: ObjectDescriptor,
    pub body: ByteStream,
}

impl std::fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObject")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Keyed blob store capability (S3 bucket, blob container, local directory).
///
/// Implementations must be safe for concurrent use: independent fetch and
/// put pipelines share one client.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a read stream for `key`. `Ok(None)` means the object does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<RemoteObject>>;

    /// Store `body` under `key`, consuming the stream to completion.
    async fn put_object(&self, key: &str, content_type: &str, body: ByteStream) -> Result<()>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

/// Fetch/put contract implemented by every cache backend.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Retrieve the artifact for `key` into the working directory.
    ///
    /// Returns `Ok(false)` on a cache miss or when the artifact was skipped
    /// for exceeding the size limit. Every other failure is an error.
    async fn fetch(&self, key: &CacheKey) -> Result<bool>;

    /// Archive `files` (relative to the working directory) under `key`.
    ///
    /// Oversize outputs are skipped silently.
    async fn put(&self, key: &CacheKey, files: &[PathBuf]) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
