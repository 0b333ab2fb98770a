use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skillflow_dispatch::ErrorKind;
use skillflow_workflow::DefinitionError;

use crate::context::FailureRecord;

/// Pseudo step name for failures raised while loading a definition.
pub(crate) const DEFINITION_STEP: &str = "definition";

/// Pseudo step name for failures raised while validating inputs.
pub(crate) const INPUTS_STEP: &str = "inputs";

/// Pseudo step name for failures raised while rendering skill outputs.
pub(crate) const OUTPUTS_STEP: &str = "outputs";

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
  /// Every stage ran. Failures of `on_error: continue` steps may be
  /// recorded.
  Completed,
  /// A step with `on_error: fail` failed.
  Aborted { step: String, error_kind: ErrorKind },
  /// The run was cancelled or timed out.
  Cancelled { not_started: Vec<String> },
  /// The definition or the inputs were rejected before any step ran.
  Invalid {
    reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step_name: Option<String>,
  },
}

impl RunStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Completed => "completed",
      Self::Aborted { .. } => "aborted",
      Self::Cancelled { .. } => "cancelled",
      Self::Invalid { .. } => "invalid",
    }
  }
}

/// Aggregated result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
  pub run_id: String,
  pub skill: String,
  pub status: RunStatus,
  pub outputs: BTreeMap<String, String>,
  pub steps_run: Vec<String>,
  pub steps_skipped: Vec<String>,
  pub failures: Vec<FailureRecord>,
}

impl WorkflowResult {
  /// Result for a skill whose definition failed to load.
  pub fn invalid(run_id: impl Into<String>, skill: impl Into<String>, error: DefinitionError) -> Self {
    Self::rejected(run_id.into(), skill.into(), DEFINITION_STEP, error)
  }

  /// Result for a run whose inputs were rejected.
  pub fn invalid_inputs(
    run_id: impl Into<String>,
    skill: impl Into<String>,
    error: DefinitionError,
  ) -> Self {
    Self::rejected(run_id.into(), skill.into(), INPUTS_STEP, error)
  }

  fn rejected(run_id: String, skill: String, site: &str, error: DefinitionError) -> Self {
    let failure = FailureRecord::new(
      error.step_name.as_deref().unwrap_or(site),
      None,
      ErrorKind::DefinitionError,
      error.to_string(),
      0,
    );
    Self {
      run_id,
      skill,
      status: RunStatus::Invalid {
        reason: error.reason,
        step_name: error.step_name,
      },
      outputs: BTreeMap::new(),
      steps_run: Vec::new(),
      steps_skipped: Vec::new(),
      failures: vec![failure],
    }
  }

  pub fn is_completed(&self) -> bool {
    self.status == RunStatus::Completed
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_status_serialization() {
    assert_eq!(
      serde_json::to_value(RunStatus::Aborted {
        step: "merge".to_string(),
        error_kind: ErrorKind::ExternalOperationError,
      })
      .unwrap(),
      json!({ "state": "aborted", "step": "merge", "error_kind": "ExternalOperationError" })
    );
    assert_eq!(
      serde_json::to_value(RunStatus::Completed).unwrap(),
      json!({ "state": "completed" })
    );
  }

  #[test]
  fn test_invalid_result() {
    let result = WorkflowResult::invalid_inputs(
      "run-1",
      "review",
      DefinitionError::new("missing required input 'mr_id'"),
    );
    assert_eq!(result.status.as_str(), "invalid");
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].error_kind, ErrorKind::DefinitionError);
    assert_eq!(result.failures[0].step_name, INPUTS_STEP);
    assert!(result.steps_run.is_empty());

    let result = WorkflowResult::invalid(
      "run-2",
      "review",
      DefinitionError::at_step("fetch", "unknown operation 'get_mr'"),
    );
    assert_eq!(result.failures[0].step_name, "fetch");
    assert_eq!(
      result.status,
      RunStatus::Invalid {
        reason: "unknown operation 'get_mr'".to_string(),
        step_name: Some("fetch".to_string()),
      }
    );
  }
}
