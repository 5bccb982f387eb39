//! Command handlers.

use crate::config::{CliConfig, StorageSettings};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage_cache::StorageFactory;
use stowage_core::{CacheKey, CacheStorage, StorageConfig};
use tracing::debug;

/// Build the storage selected by `settings` for `cwd`.
pub async fn open_storage(
    settings: &StorageSettings,
    file: &CliConfig,
    cwd: &Path,
) -> Result<Arc<dyn CacheStorage>, Box<dyn std::error::Error>> {
    debug!(provider = %settings.provider, cwd = %cwd.display(), "Opening cache storage");
    let config = StorageConfig::from_serialized(&settings.provider, settings.options.as_deref())?;
    let mut factory = StorageFactory::new(cwd);
    if let Some(root) = &file.local_root {
        factory = factory.with_local_root(root);
    }
    Ok(factory.build(config).await?)
}

/// Restore the outputs for `hash`, printing `hit` or `miss`.
pub async fn fetch(storage: &dyn CacheStorage, hash: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let hit = storage.fetch(&CacheKey::new(hash)).await?;
    println!("{}", if hit { "hit" } else { "miss" });
    Ok(hit)
}

/// Upload `files` under `hash`.
pub async fn put(
    storage: &dyn CacheStorage,
    hash: &str,
    files: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    storage.put(&CacheKey::new(hash), files).await?;
    Ok(())
}

/// Validate and print the resolved configuration.
pub fn show_config(settings: &StorageSettings) -> Result<(), Box<dyn std::error::Error>> {
    let config = StorageConfig::from_serialized(&settings.provider, settings.options.as_deref())?;
    println!("{} Storage provider: {}", style("✓").green(), config.provider());
    if settings.options.is_some() {
        println!("  Options: valid");
    }
    match CliConfig::config_path() {
        Ok(path) => println!("  Config file: {}", path.display()),
        Err(_) => println!("  Config file: {}", style("unavailable").dim()),
    }
    Ok(())
}
