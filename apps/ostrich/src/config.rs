//! # Configuration
//!
//! Optional TOML file passed with `--config`:
//!
//! ```toml
//! [store]
//! page_size = 1024
//! exact_count_limit = 10000
//! snapshot_block_size = 4096
//! ```
//!
//! Every key is optional. Command-line flags override the file.

use ostrich_core::{StoreError, StoreOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub store: StoreOptions,
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidArgument(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            StoreError::InvalidArgument(reason) => {
                StoreError::InvalidArgument(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(contents: &str) -> Result<Self, StoreError> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| StoreError::InvalidArgument(format!("Failed to parse TOML: {}", e)))?;
        config.store.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
