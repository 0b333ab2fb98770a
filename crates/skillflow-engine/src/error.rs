use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up the engine. Runs themselves never fail.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("failed to prepare log directory '{}': {source}", path.display())]
  LogDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}
