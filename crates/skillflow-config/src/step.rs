use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arg::ArgValue;
use crate::enums::OnError;

/// Tool name marking a step whose logic runs inside the engine process.
pub const COMPUTE_TOOL: &str = "compute";

/// One step of a skill as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDef {
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
  /// Name of an external operation, or `compute` for an inline function.
  pub tool: String,
  /// Inline function name, required when `tool` is `compute`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub compute: Option<String>,
  #[serde(default)]
  pub args: BTreeMap<String, ArgValue>,
  /// Boolean expression; the step is skipped when it evaluates false.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  /// Context binding for the step's result.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<String>,
  #[serde(default)]
  pub on_error: OnError,
  /// Fan-out group name. Contiguous steps sharing a group run concurrently.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parallel: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl StepDef {
  pub fn is_compute(&self) -> bool {
    self.tool == COMPUTE_TOOL
  }
}
