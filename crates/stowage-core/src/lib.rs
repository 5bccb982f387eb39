//! Stowage Core
//!
//! Core types, port traits, and error handling for the stowage build cache.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the storage backends, the CLI and the test harness.

pub mod config;
pub mod error;
pub mod key;
pub mod ports;

pub use config::{
    azure_blob_config_from_serialized_options, npm_config_from_serialized_options,
    s3_config_from_serialized_options, AzureBlobStorageOptions, CustomStorageConfig,
    NpmStorageOptions, S3ClientConfig, S3Credentials, S3StorageOptions, StorageConfig,
    StorageConstructor,
};
pub use error::{Error, Result};
pub use key::CacheKey;
pub use ports::{ByteStream, CacheStorage, ObjectDescriptor, ObjectStore, RemoteObject};
