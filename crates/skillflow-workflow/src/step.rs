use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use skillflow_config::{ArgValue, OnError};

/// What a step invokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Operation {
  /// A named external operation (CLI wrapper or HTTP call).
  External(String),
  /// A pure function executed inside the engine process.
  Compute(String),
}

impl Operation {
  pub fn name(&self) -> &str {
    match self {
      Self::External(name) | Self::Compute(name) => name,
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::External(name) => write!(f, "{}", name),
      Self::Compute(name) => write!(f, "compute:{}", name),
    }
  }
}

/// A validated step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub name: String,
  pub description: String,
  pub operation: Operation,
  pub args: BTreeMap<String, ArgValue>,
  pub condition: Option<String>,
  pub output: Option<String>,
  pub on_error: OnError,
  pub parallel: Option<String>,
  pub timeout_ms: Option<u64>,
}
