//! Cache storage over a keyed object store.
//!
//! Downloads run remote body → sponge → hang timeout → tar extraction into the
//! working directory. Uploads pack the file set into a tar stream that is
//! handed to the store as it is produced.

use crate::archiver::{self, TAR_CONTENT_TYPE};
use crate::sponge::{Sponge, DEFAULT_BUFFER_LIMIT};
use crate::timeout::{HangTimeout, HANG_TIMEOUT};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stowage_core::{CacheKey, CacheStorage, Error, ObjectStore, Result};
use stowage_trace::{fetch_span, put_span, CacheAttributes};
use tracing::{debug, info, Instrument};

/// [`CacheStorage`] backed by any [`ObjectStore`].
pub struct RemoteCacheStorage {
    store: Arc<dyn ObjectStore>,
    cwd: PathBuf,
    prefix: Option<String>,
    size_limit: Option<u64>,
    buffer_limit: u64,
    hang_timeout: Duration,
    name: String,
}

impl RemoteCacheStorage {
    pub fn new(store: Arc<dyn ObjectStore>, cwd: impl Into<PathBuf>) -> Self {
        let name = store.name().to_string();
        Self {
            store,
            cwd: cwd.into(),
            prefix: None,
            size_limit: None,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            hang_timeout: HANG_TIMEOUT,
            name,
        }
    }

    /// Prepend `prefix` to every object key.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Skip artifacts larger than `limit` bytes. `Some(0)` means no limit.
    pub fn with_size_limit(mut self, limit: Option<u64>) -> Self {
        self.size_limit = limit.filter(|l| *l > 0);
        self
    }

    /// Ceiling on bytes held in memory while a download completes.
    pub fn with_buffer_limit(mut self, limit: u64) -> Self {
        self.buffer_limit = limit;
        self
    }

    pub fn with_hang_timeout(mut self, timeout: Duration) -> Self {
        self.hang_timeout = timeout;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn size_limit(&self) -> Option<u64> {
        self.size_limit
    }

    async fn download(&self, hash: &str, object_key: &str) -> Result<bool> {
        let Some(object) = self.store.get_object(object_key).await? else {
            debug!(key = object_key, "Cache miss");
            return Ok(false);
        };

        let declared = object.descriptor.content_length;
        if let (Some(limit), Some(size)) = (self.size_limit, declared) {
            if size > limit {
                debug!(
                    "Object is too large to be downloaded: {}, size: {} bytes",
                    object_key, size
                );
                return Ok(false);
            }
        }

        // Without a declared size the limit can only be enforced while buffering.
        let capped = match (self.size_limit, declared) {
            (Some(limit), None) if limit < self.buffer_limit => Some(limit),
            _ => None,
        };
        let sponge = Sponge::with_limit(object.body, capped.unwrap_or(self.buffer_limit));
        let body = HangTimeout::new(
            sponge,
            self.hang_timeout,
            format!("The fetch request to {} seems to be hanging", hash),
        );

        match archiver::unpack(Box::pin(body), &self.cwd).await {
            Ok(()) => {
                debug!(key = object_key, "Cache hit");
                Ok(true)
            }
            Err(Error::BufferOverflow { limit }) if capped == Some(limit) => {
                debug!(
                    "Object is too large to be downloaded: {}, size: more than {} bytes",
                    object_key, limit
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn upload(&self, object_key: &str, files: &[PathBuf]) -> Result<bool> {
        for file in files {
            archiver::validate_entry(file)?;
        }

        if let Some(limit) = self.size_limit {
            let size = total_size(&self.cwd, files).await?;
            if size > limit {
                debug!(
                    "The output is too large to be uploaded: {}, size: {} bytes",
                    object_key, size
                );
                return Ok(false);
            }
        }

        let body = archiver::pack(self.cwd.clone(), files.to_vec());
        self.store
            .put_object(object_key, TAR_CONTENT_TYPE, body)
            .await?;
        info!(key = object_key, files = files.len(), "Uploaded cache artifact");
        Ok(true)
    }
}

#[async_trait]
impl CacheStorage for RemoteCacheStorage {
    async fn fetch(&self, key: &CacheKey) -> Result<bool> {
        let object_key = key.object_key(self.prefix.as_deref());
        let span = fetch_span(
            &CacheAttributes::new()
                .provider(&self.name)
                .key(key.as_str(), &object_key),
        );

        let start = Instant::now();
        let result = self.download(key.as_str(), &object_key).instrument(span.clone()).await;
        span.record("cache.duration_ms", start.elapsed().as_millis() as u64);
        if let Ok(hit) = &result {
            span.record("cache.hit", *hit);
        }
        result
    }

    async fn put(&self, key: &CacheKey, files: &[PathBuf]) -> Result<()> {
        let object_key = key.object_key(self.prefix.as_deref());
        let span = put_span(
            &CacheAttributes::new()
                .provider(&self.name)
                .key(key.as_str(), &object_key)
                .files(files.len()),
        );

        let start = Instant::now();
        let result = self.upload(&object_key, files).instrument(span.clone()).await;
        span.record("cache.duration_ms", start.elapsed().as_millis() as u64);
        let uploaded = result?;
        span.record("cache.uploaded", uploaded);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Sum the on-disk size of `files`, one entry after another.
/// Directories count everything beneath them.
async fn total_size(cwd: &Path, files: &[PathBuf]) -> Result<u64> {
    let paths: Vec<PathBuf> = files.iter().map(|f| cwd.join(f)).collect();
    tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut total = 0;
        for path in &paths {
            total += disk_usage(path)?;
        }
        Ok(total)
    })
    .await
    .map_err(|e| Error::Internal(format!("Size check failed: {}", e)))?
}

fn disk_usage(path: &Path) -> std::io::Result<u64> {
    let metadata = std::fs::symlink_metadata(path)?;
    if !metadata.is_dir() {
        return Ok(metadata.len());
    }
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        total += disk_usage(&entry?.path())?;
    }
    Ok(total)
}
