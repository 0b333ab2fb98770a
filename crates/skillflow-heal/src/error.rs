use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealError {
  #[error("invalid detector pattern '{pattern}': {source}")]
  InvalidPattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },

  #[error("policy '{category}' remediates kinds but names no remediation operation")]
  MissingRemediation { category: String },
}
