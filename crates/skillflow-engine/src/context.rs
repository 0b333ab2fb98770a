use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skillflow_dispatch::{ErrorKind, StepOutcome};
use skillflow_expr::Scope;
use skillflow_heal::RemediationOutcome;

/// One failed attempt, kept for audit and reporting.
///
/// Records are appended and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
  pub step_name: String,
  /// Operation the step dispatched, if it got that far.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub operation: Option<String>,
  pub error_kind: ErrorKind,
  pub message: String,
  pub timestamp: DateTime<Utc>,
  /// Dispatch attempt this failure belongs to, starting at 1.
  pub attempt: u32,
  pub remediation_attempted: bool,
  pub remediation_outcome: RemediationOutcome,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remediation_operation: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remediation_message: Option<String>,
}

impl FailureRecord {
  /// A failure with no remediation involved.
  pub fn new(
    step_name: impl Into<String>,
    operation: Option<String>,
    error_kind: ErrorKind,
    message: impl Into<String>,
    attempt: u32,
  ) -> Self {
    Self {
      step_name: step_name.into(),
      operation,
      error_kind,
      message: message.into(),
      timestamp: Utc::now(),
      attempt,
      remediation_attempted: false,
      remediation_outcome: RemediationOutcome::NotAttempted,
      remediation_operation: None,
      remediation_message: None,
    }
  }
}

/// Read-only view of the context handed to a step.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
  pub inputs: Map<String, Value>,
  /// Success values only.
  pub results: Map<String, Value>,
  pub scope: Scope,
}

/// Run-scoped accumulator of inputs, step outcomes and failures.
///
/// Owned by a single engine run. Fan-out members never write here
/// directly; their reports are applied after the group's barrier.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
  inputs: Map<String, Value>,
  results: Vec<(String, StepOutcome)>,
  failures: Vec<FailureRecord>,
}

impl ExecutionContext {
  pub fn new(inputs: Map<String, Value>) -> Self {
    Self {
      inputs,
      results: Vec::new(),
      failures: Vec::new(),
    }
  }

  pub fn inputs(&self) -> &Map<String, Value> {
    &self.inputs
  }

  /// Record a step outcome under its output name.
  ///
  /// Recording the same name again replaces the earlier entry in place.
  pub fn record(&mut self, name: &str, outcome: StepOutcome) {
    match self.results.iter_mut().find(|(n, _)| n == name) {
      Some((_, existing)) => *existing = outcome,
      None => self.results.push((name.to_string(), outcome)),
    }
  }

  pub fn get(&self, name: &str) -> Option<&StepOutcome> {
    self
      .results
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, outcome)| outcome)
  }

  /// Outcomes in the order they were first recorded.
  pub fn results(&self) -> &[(String, StepOutcome)] {
    &self.results
  }

  /// Values of successful outcomes, keyed by output name.
  pub fn success_values(&self) -> Map<String, Value> {
    self
      .results
      .iter()
      .filter_map(|(name, outcome)| outcome.value().map(|v| (name.clone(), v.clone())))
      .collect()
  }

  pub fn append_failures(&mut self, records: impl IntoIterator<Item = FailureRecord>) {
    self.failures.extend(records);
  }

  pub fn failures(&self) -> &[FailureRecord] {
    &self.failures
  }

  pub fn into_failures(self) -> Vec<FailureRecord> {
    self.failures
  }

  pub fn snapshot(&self) -> ContextSnapshot {
    let results = self.success_values();
    let scope = Scope::new(&self.inputs, &results);
    ContextSnapshot {
      inputs: self.inputs.clone(),
      results,
      scope,
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_record_overwrites_in_place() {
    let mut ctx = ExecutionContext::default();
    ctx.record("a", StepOutcome::failure(ErrorKind::Timeout, "slow"));
    ctx.record("b", StepOutcome::success(json!(2)));
    ctx.record("a", StepOutcome::success(json!(1)));

    let names: Vec<&str> = ctx.results().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(ctx.get("a"), Some(&StepOutcome::success(json!(1))));
  }

  #[test]
  fn test_snapshot_hides_failures() {
    let mut ctx = ExecutionContext::new(json!({ "flag": true }).as_object().cloned().unwrap());
    ctx.record("ok", StepOutcome::success(json!({ "n": 1 })));
    ctx.record("bad", StepOutcome::failure(ErrorKind::ExternalOperationError, "conflict"));

    let snapshot = ctx.snapshot();
    assert_eq!(snapshot.results.len(), 1);
    assert!(snapshot.results.contains_key("ok"));
    assert!(!snapshot.results.contains_key("bad"));
    assert_eq!(snapshot.inputs["flag"], json!(true));
  }

  #[test]
  fn test_failure_record_serialization() {
    let record = FailureRecord::new("fetch", Some("get_mr".to_string()), ErrorKind::Timeout, "slow", 1);
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["error_kind"], "Timeout");
    assert_eq!(value["remediation_outcome"], "not_attempted");
    assert_eq!(value["remediation_attempted"], false);
    assert!(value.get("remediation_operation").is_none());
  }
}
