use thiserror::Error;

/// Errors raised while parsing a skill document.
#[derive(Debug, Error)]
pub enum ParseError {
  #[error("invalid YAML skill document: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("invalid JSON skill document: {0}")]
  Json(#[from] serde_json::Error),
}
