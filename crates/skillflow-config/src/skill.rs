use serde::{Deserialize, Serialize};

use crate::enums::InputType;
use crate::step::StepDef;

/// A skill document: typed inputs, ordered steps, rendered outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillDef {
  pub name: String,
  #[serde(default = "default_version")]
  pub version: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub inputs: Vec<InputDef>,
  #[serde(default)]
  pub steps: Vec<StepDef>,
  #[serde(default)]
  pub outputs: Vec<OutputDef>,
}

fn default_version() -> String {
  "1.0".to_string()
}

/// A declared skill input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDef {
  pub name: String,
  #[serde(rename = "type", default)]
  pub input_type: InputType,
  #[serde(default)]
  pub required: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
}

/// A named output rendered from the final context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputDef {
  pub name: String,
  pub value: String,
}
