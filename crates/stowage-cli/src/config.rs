//! CLI configuration management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stowage_trace::LogFormat;

/// Provider used when nothing else selects one.
pub const DEFAULT_PROVIDER: &str = "local";

/// Contents of the YAML config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Storage provider tag.
    pub provider: Option<String>,
    /// Provider options, either a JSON string or an inline mapping.
    pub options: Option<serde_yaml::Value>,
    /// Object directory for the `local` provider.
    pub local_root: Option<PathBuf>,
    #[serde(default)]
    pub log_format: Option<LogFormat>,
}

impl CliConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file yields the default configuration; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::config_path()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let dirs = directories::ProjectDirs::from("io", "stowage", "stowage")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Options as the serialized JSON string the provider parsers expect.
    pub fn serialized_options(&self) -> Result<Option<String>, serde_json::Error> {
        match &self.options {
            None => Ok(None),
            Some(serde_yaml::Value::String(raw)) => Ok(Some(raw.clone())),
            Some(value) => serde_json::to_string(value).map(Some),
        }
    }
}

/// Provider selection after applying precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub provider: String,
    pub options: Option<String>,
}

/// Resolve the provider and its options.
///
/// Flags (or their environment variables, which clap folds into the same
/// arguments) win over the config file; the provider defaults to `local`.
pub fn resolve_storage(
    provider: Option<String>,
    options: Option<String>,
    file: &CliConfig,
) -> Result<StorageSettings, serde_json::Error> {
    let options = match options {
        Some(options) => Some(options),
        None => file.serialized_options()?,
    };
    Ok(StorageSettings {
        provider: provider
            .or_else(|| file.provider.clone())
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
        options,
    })
}
