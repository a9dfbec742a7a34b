//! # Store Options
//!
//! Per-store tuning. Every field has a default, so an empty TOML table or
//! `StoreOptions::default()` yields a working configuration.

use crate::StoreError;
use crate::primitives::{DEFAULT_EXACT_COUNT_LIMIT, DEFAULT_PAGE_SIZE, DEFAULT_SNAPSHOT_BLOCK_SIZE};
use serde::{Deserialize, Serialize};

/// Options applied when opening a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// Refuse appends and never create missing directories.
    pub read_only: bool,
    /// Patch-tree entries fetched per storage page.
    pub page_size: usize,
    /// Matches counted past the requested page before estimating.
    pub exact_count_limit: usize,
    /// Triples per compressed snapshot block.
    pub snapshot_block_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            page_size: DEFAULT_PAGE_SIZE,
            exact_count_limit: DEFAULT_EXACT_COUNT_LIMIT,
            snapshot_block_size: DEFAULT_SNAPSHOT_BLOCK_SIZE,
        }
    }
}

impl StoreOptions {
    /// Default options with `read_only` set.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.page_size == 0 {
            return Err(StoreError::InvalidArgument(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.snapshot_block_size == 0 {
            return Err(StoreError::InvalidArgument(
                "snapshot_block_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_primitives() {
        let options = StoreOptions::default();
        assert!(!options.read_only);
        assert_eq!(options.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(options.exact_count_limit, DEFAULT_EXACT_COUNT_LIMIT);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn zero_page_size_rejected() {
        let options = StoreOptions {
            page_size: 0,
            ..StoreOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}
