//! Error types for stowage.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Timeout(String),

    // Archive errors
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Path escapes the working directory: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Download exceeded the buffer limit of {limit} bytes")]
    BufferOverflow { limit: u64 },

    // Configuration errors
    #[error("Invalid {provider} storage options")]
    InvalidStorageConfig { provider: String },

    #[error("Unknown cache storage provider: {0}")]
    UnknownProvider(String),

    #[error("No client is linked for cache storage provider: {0}")]
    ProviderNotLinked(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Build the configuration error raised for a malformed provider.
    pub fn invalid_config(provider: impl Into<String>) -> Self {
        Error::InvalidStorageConfig {
            provider: provider.into(),
        }
    }
}
