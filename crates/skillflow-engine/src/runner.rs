//! Load-and-run entry points.

use serde_json::{Map, Value, json};
use skillflow_resolver::DefinitionStore;
use skillflow_workflow::DefinitionError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::engine::WorkflowEngine;
use crate::result::WorkflowResult;

/// Runs skills by name.
///
/// # Usage
///
/// ```ignore
/// let runner = SkillRunner::new(definitions, engine);
/// let result = runner.skill_run("review_mr", r#"{"mr_id": 42}"#).await;
/// ```
pub struct SkillRunner {
  definitions: DefinitionStore,
  engine: WorkflowEngine,
}

impl SkillRunner {
  pub fn new(definitions: DefinitionStore, engine: WorkflowEngine) -> Self {
    Self {
      definitions,
      engine,
    }
  }

  pub fn definitions(&self) -> &DefinitionStore {
    &self.definitions
  }

  pub fn engine(&self) -> &WorkflowEngine {
    &self.engine
  }

  /// Load `name` and run it. Load failures come back as an invalid result.
  pub async fn run(&self, name: &str, inputs: Map<String, Value>) -> WorkflowResult {
    self.run_with_cancel(name, inputs, CancellationToken::new()).await
  }

  pub async fn run_with_cancel(
    &self,
    name: &str,
    inputs: Map<String, Value>,
    cancel: CancellationToken,
  ) -> WorkflowResult {
    match self.definitions.load(name).await {
      Ok(definition) => self.engine.run_with_cancel(&definition, inputs, cancel).await,
      Err(e) => {
        warn!(skill = %name, error = %e, "skill_load_failed");
        WorkflowResult::invalid(uuid::Uuid::new_v4().to_string(), name, e)
      }
    }
  }

  /// Run a skill from a JSON object of inputs and return the result as JSON.
  ///
  /// An empty string means no inputs. Malformed input JSON produces an
  /// invalid result rather than an error.
  pub async fn skill_run(&self, name: &str, inputs_json: &str) -> String {
    let result = match parse_inputs(inputs_json) {
      Ok(inputs) => self.run(name, inputs).await,
      Err(e) => WorkflowResult::invalid_inputs(uuid::Uuid::new_v4().to_string(), name, e),
    };
    serde_json::to_string(&result).unwrap_or_else(|e| {
      json!({
        "run_id": result.run_id,
        "skill": result.skill,
        "status": { "state": "invalid", "reason": format!("failed to serialize result: {}", e) },
      })
      .to_string()
    })
  }
}

fn parse_inputs(inputs_json: &str) -> Result<Map<String, Value>, DefinitionError> {
  if inputs_json.trim().is_empty() {
    return Ok(Map::new());
  }
  match serde_json::from_str::<Value>(inputs_json) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(Value::Null) => Ok(Map::new()),
    Ok(other) => Err(DefinitionError::new(format!(
      "inputs must be a JSON object, got {}",
      json_type(&other)
    ))),
    Err(e) => Err(DefinitionError::new(format!("inputs are not valid JSON: {}", e))),
  }
}

fn json_type(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_inputs() {
    assert!(parse_inputs("").unwrap().is_empty());
    assert!(parse_inputs("  null ").unwrap().is_empty());
    assert_eq!(parse_inputs(r#"{"a": 1}"#).unwrap()["a"], 1);

    let err = parse_inputs("[1, 2]").unwrap_err();
    assert_eq!(err.reason, "inputs must be a JSON object, got array");

    let err = parse_inputs("{not json").unwrap_err();
    assert!(err.reason.starts_with("inputs are not valid JSON"));
  }
}
