use serde::{Deserialize, Serialize};
use skillflow_config::{InputDef, OutputDef};

use crate::plan::ExecutionPlan;
use crate::step::Step;

/// Names that cannot be used for inputs or step outputs because the
/// expression scope binds them to the input and result maps.
pub const RESERVED_NAMES: [&str; 2] = ["inputs", "results"];

/// A locked skill definition ready for execution.
///
/// Immutable once built by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
  pub name: String,
  pub version: String,
  pub description: String,
  pub inputs: Vec<InputDef>,
  pub steps: Vec<Step>,
  pub outputs: Vec<OutputDef>,
  /// Content digest of the source document, e.g. "sha256:ab12...".
  pub digest: String,
}

impl WorkflowDefinition {
  /// Derive the execution plan from declaration order.
  pub fn plan(&self) -> ExecutionPlan {
    ExecutionPlan::new(&self.steps)
  }

  /// Get a step by name.
  pub fn get_step(&self, name: &str) -> Option<&Step> {
    self.steps.iter().find(|s| s.name == name)
  }

  /// Get a declared input by name.
  pub fn get_input(&self, name: &str) -> Option<&InputDef> {
    self.inputs.iter().find(|i| i.name == name)
  }
}
