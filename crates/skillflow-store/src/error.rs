use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading skill documents from storage.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("invalid skill name '{name}'")]
  InvalidName { name: String },

  #[error("failed to read '{}': {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
