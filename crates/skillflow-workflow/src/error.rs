use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A load-time or input-validation failure.
///
/// Raised before any step runs; never produced by a running step.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason}{}", location(.step_name))]
pub struct DefinitionError {
  pub reason: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub step_name: Option<String>,
}

fn location(step_name: &Option<String>) -> String {
  match step_name {
    Some(step) => format!(" (step '{}')", step),
    None => String::new(),
  }
}

impl DefinitionError {
  pub fn new(reason: impl Into<String>) -> Self {
    Self {
      reason: reason.into(),
      step_name: None,
    }
  }

  pub fn at_step(step_name: impl Into<String>, reason: impl Into<String>) -> Self {
    Self {
      reason: reason.into(),
      step_name: Some(step_name.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    let err = DefinitionError::at_step("fetch", "unknown operation 'nope'");
    assert_eq!(err.to_string(), "unknown operation 'nope' (step 'fetch')");

    let err = DefinitionError::new("skill has no name");
    assert_eq!(err.to_string(), "skill has no name");
  }
}
