use serde::{Deserialize, Serialize};

/// The closed set of skill input types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
  #[default]
  String,
  Integer,
  Boolean,
  Array,
}

impl InputType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::String => "string",
      Self::Integer => "integer",
      Self::Boolean => "boolean",
      Self::Array => "array",
    }
  }
}

/// What happens to the run when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
  /// Abort the run at this step.
  #[default]
  Fail,
  /// Record the failure and keep going.
  Continue,
}
