//! Import configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Keys per store round trip when inserting or refetching.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Settings for one import run. Every field has a default, so an empty
/// configuration source is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
  /// Directory scanned for `censo_<year>.csv` files.
  pub census_dir: PathBuf,
  pub store_path: PathBuf,
  pub chunk_size: usize,
  /// Parse and stage every file but write nothing.
  pub dry_run:    bool,
}

impl Default for ImportConfig {
  fn default() -> Self {
    Self {
      census_dir: PathBuf::from("censos"),
      store_path: PathBuf::from("censo.db"),
      chunk_size: DEFAULT_CHUNK_SIZE,
      dry_run:    false,
    }
  }
}

impl ImportConfig {
  pub fn validate(&self) -> Result<()> {
    if self.chunk_size == 0 {
      return Err(Error::Config("chunk_size must be at least 1".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = ImportConfig::default();
    assert_eq!(config.chunk_size, 500);
    assert!(!config.dry_run);
    config.validate().unwrap();
  }

  #[test]
  fn zero_chunk_size_is_rejected() {
    let config = ImportConfig { chunk_size: 0, ..Default::default() };
    assert!(matches!(config.validate(), Err(Error::Config(_))));
  }
}
