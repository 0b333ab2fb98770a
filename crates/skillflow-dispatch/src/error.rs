use thiserror::Error;

/// Errors raised while building a dispatcher from configuration.
#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("operation '{operation}': unsupported HTTP method '{method}'")]
  InvalidMethod { operation: String, method: String },

  #[error("operation '{operation}': program is empty")]
  EmptyProgram { operation: String },

  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),
}
