use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("failed to read settings file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse settings file {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("invalid settings: {message}")]
  Invalid { message: String },
}
