//! Cache storage provider configuration.
//!
//! A run selects exactly one provider. Serialized options (JSON strings, as
//! they arrive from environment variables or config files) are decoded into
//! strongly-shaped option records; validation is shape-only.

use crate::ports::{CacheStorage, ObjectStore};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// Constructor for a caller-supplied backend, given the working directory.
pub type StorageConstructor =
    Arc<dyn Fn(&Path) -> Result<Arc<dyn CacheStorage>> + Send + Sync>;

/// Provider selection for a run.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local disk cache.
    Local,
    /// Caching disabled.
    LocalSkip,
    /// Registry package backed cache.
    Npm(NpmStorageOptions),
    /// Cloud blob container backed cache.
    AzureBlob(AzureBlobStorageOptions),
    /// S3-compatible object store backed cache.
    S3(S3StorageOptions),
    /// Caller-supplied backend.
    Custom(CustomStorageConfig),
}

impl StorageConfig {
    /// Decode the configuration for `provider` from its serialized options.
    ///
    /// `local` and `local-skip` take no options. Unknown tags are rejected.
    pub fn from_serialized(provider: &str, options: Option<&str>) -> Result<Self> {
        match provider {
            "local" => Ok(StorageConfig::Local),
            "local-skip" => Ok(StorageConfig::LocalSkip),
            "npm" => npm_config_from_serialized_options(options.unwrap_or_default()),
            "azure-blob" => azure_blob_config_from_serialized_options(options.unwrap_or_default()),
            "s3" => s3_config_from_serialized_options(options.unwrap_or_default()),
            other => {
                error!(provider = other, "Unknown cache storage provider");
                Err(Error::UnknownProvider(other.to_string()))
            }
        }
    }

    /// Provider tag (or the custom provider's display name).
    pub fn provider(&self) -> &str {
        match self {
            StorageConfig::Local => "local",
            StorageConfig::LocalSkip => "local-skip",
            StorageConfig::Npm(_) => "npm",
            StorageConfig::AzureBlob(_) => "azure-blob",
            StorageConfig::S3(_) => "s3",
            StorageConfig::Custom(custom) => custom.name.as_deref().unwrap_or("custom"),
        }
    }
}

/// Options for the registry package backed cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpmStorageOptions {
    pub npm_package_name: String,
    pub registry_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npmrc_userconfig: Option<String>,
}

/// Options for the blob container backed cache.
#[derive(Clone)]
pub enum AzureBlobStorageOptions {
    /// Connect with a connection string.
    ConnectionString {
        connection_string: String,
        container: String,
        max_size: Option<u64>,
    },
    /// Use an already constructed container client.
    Client {
        client: Arc<dyn ObjectStore>,
        max_size: Option<u64>,
    },
}

impl AzureBlobStorageOptions {
    pub fn max_size(&self) -> Option<u64> {
        match self {
            AzureBlobStorageOptions::ConnectionString { max_size, .. }
            | AzureBlobStorageOptions::Client { max_size, .. } => size_limit(*max_size),
        }
    }
}

impl fmt::Debug for AzureBlobStorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AzureBlobStorageOptions::ConnectionString {
                container,
                max_size,
                ..
            } => f
                .debug_struct("ConnectionString")
                .field("connection_string", &"<redacted>")
                .field("container", container)
                .field("max_size", max_size)
                .finish(),
            AzureBlobStorageOptions::Client { client, max_size } => f
                .debug_struct("Client")
                .field("client", &client.name())
                .field("max_size", max_size)
                .finish(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedAzureBlobOptions {
    connection_string: String,
    container: String,
    #[serde(default, deserialize_with = "size_limit_from_number")]
    max_size: Option<u64>,
}

/// Options for the S3-compatible object store backed cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3StorageOptions {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_config: Option<S3ClientConfig>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "size_limit_from_number"
    )]
    pub max_size: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_string"
    )]
    pub prefix: Option<String>,
}

impl S3StorageOptions {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn with_client_config(mut self, client_config: S3ClientConfig) -> Self {
        self.client_config = Some(client_config);
        self
    }

    /// Effective size limit. A zero limit means "no limit".
    pub fn size_limit(&self) -> Option<u64> {
        size_limit(self.max_size)
    }
}

/// S3 client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint (MinIO, R2, localstack).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_path_style: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<S3Credentials>,
}

/// Static S3 credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Caller-supplied backend.
#[derive(Clone)]
pub struct CustomStorageConfig {
    pub constructor: StorageConstructor,
    /// Display name for diagnostics.
    pub name: Option<String>,
}

impl CustomStorageConfig {
    pub fn new<F>(constructor: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn CacheStorage>> + Send + Sync + 'static,
    {
        Self {
            constructor: Arc::new(constructor),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Debug for CustomStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomStorageConfig")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Decode npm storage options.
pub fn npm_config_from_serialized_options(options: &str) -> Result<StorageConfig> {
    let parsed: NpmStorageOptions = parse_options("npm", options)?;
    Ok(StorageConfig::Npm(parsed))
}

/// Decode blob container storage options (connection string shape).
pub fn azure_blob_config_from_serialized_options(options: &str) -> Result<StorageConfig> {
    let parsed: SerializedAzureBlobOptions = parse_options("azure-blob", options)?;
    Ok(StorageConfig::AzureBlob(
        AzureBlobStorageOptions::ConnectionString {
            connection_string: parsed.connection_string,
            container: parsed.container,
            max_size: parsed.max_size,
        },
    ))
}

/// Decode S3 storage options.
pub fn s3_config_from_serialized_options(options: &str) -> Result<StorageConfig> {
    let parsed: S3StorageOptions = parse_options("s3", options)?;
    Ok(StorageConfig::S3(parsed))
}

fn parse_options<T: DeserializeOwned>(provider: &str, options: &str) -> Result<T> {
    serde_json::from_str(options).map_err(|e| {
        error!(provider, error = %e, "Incorrect {} storage configuration", provider);
        Error::invalid_config(provider)
    })
}

fn size_limit(max_size: Option<u64>) -> Option<u64> {
    max_size.filter(|limit| *limit > 0)
}

/// Any JSON number is a valid `maxSize`; `null` is not. Non-positive values
/// disable the limit and fractions round down to whole bytes.
fn size_limit_from_number<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok((value >= 1.0).then(|| value as u64))
}

/// An optional string field that, when present, must be a string.
fn present_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}
