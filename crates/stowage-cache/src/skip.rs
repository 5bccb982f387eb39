//! Storage used when caching is disabled.

use async_trait::async_trait;
use std::path::PathBuf;
use stowage_core::{CacheKey, CacheStorage, Result};
use tracing::debug;

/// Every fetch misses and every put is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipStorage;

#[async_trait]
impl CacheStorage for SkipStorage {
    async fn fetch(&self, key: &CacheKey) -> Result<bool> {
        debug!(key = %key, "Caching disabled, skipping fetch");
        Ok(false)
    }

    async fn put(&self, key: &CacheKey, _files: &[PathBuf]) -> Result<()> {
        debug!(key = %key, "Caching disabled, skipping put");
        Ok(())
    }

    fn name(&self) -> &str {
        "local-skip"
    }
}
