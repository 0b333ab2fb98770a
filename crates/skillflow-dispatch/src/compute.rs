use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use crate::outcome::{ErrorKind, StepOutcome, parse_output};

/// Everything an inline compute function may read.
pub struct ComputeInput<'a> {
  pub inputs: &'a Map<String, Value>,
  /// Successful step outputs recorded so far.
  pub results: &'a Map<String, Value>,
  /// The step's rendered arguments.
  pub args: &'a BTreeMap<String, String>,
}

impl ComputeInput<'_> {
  /// A required argument.
  pub fn arg(&self, name: &str) -> Result<&str, String> {
    self
      .args
      .get(name)
      .map(String::as_str)
      .ok_or_else(|| format!("missing argument '{}'", name))
  }
}

/// A pure function of the run state.
pub type ComputeFn = Arc<dyn Fn(&ComputeInput<'_>) -> Result<Value, String> + Send + Sync>;

/// Named inline compute functions.
#[derive(Clone, Default)]
pub struct ComputeRegistry {
  functions: HashMap<String, ComputeFn>,
}

impl ComputeRegistry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry preloaded with `collect`, `parse_json`, `split_lines`,
  /// `extract` and `length`.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register("collect", collect);
    registry.register("parse_json", parse_json);
    registry.register("split_lines", split_lines);
    registry.register("extract", extract);
    registry.register("length", length);
    registry
  }

  pub fn register<F>(&mut self, name: impl Into<String>, function: F)
  where
    F: Fn(&ComputeInput<'_>) -> Result<Value, String> + Send + Sync + 'static,
  {
    self.functions.insert(name.into(), Arc::new(function));
  }

  pub fn contains(&self, name: &str) -> bool {
    self.functions.contains_key(name)
  }

  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  /// Call a function, converting errors and panics into `InternalFault`.
  pub fn call(&self, name: &str, input: &ComputeInput<'_>) -> StepOutcome {
    let Some(function) = self.functions.get(name) else {
      return StepOutcome::failure(
        ErrorKind::DefinitionError,
        format!("unknown compute function '{}'", name),
      );
    };

    match catch_unwind(AssertUnwindSafe(|| function(input))) {
      Ok(Ok(value)) => StepOutcome::success(value),
      Ok(Err(message)) => StepOutcome::failure(
        ErrorKind::InternalFault,
        format!("compute '{}' failed: {}", name, message),
      ),
      Err(payload) => StepOutcome::failure(
        ErrorKind::InternalFault,
        format!("compute '{}' panicked: {}", name, panic_message(payload.as_ref())),
      ),
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    *message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.as_str()
  } else {
    "unknown panic"
  }
}

/// Object of every argument, each parsed as JSON when possible.
fn collect(input: &ComputeInput<'_>) -> Result<Value, String> {
  Ok(Value::Object(
    input
      .args
      .iter()
      .map(|(name, value)| (name.clone(), parse_output(value)))
      .collect(),
  ))
}

fn parse_json(input: &ComputeInput<'_>) -> Result<Value, String> {
  serde_json::from_str(input.arg("value")?).map_err(|e| format!("invalid JSON: {}", e))
}

fn split_lines(input: &ComputeInput<'_>) -> Result<Value, String> {
  Ok(Value::Array(
    input
      .arg("text")?
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(|line| Value::String(line.to_string()))
      .collect(),
  ))
}

/// First capture group of `pattern` in `text`, or the whole match when the
/// pattern has no groups. No match yields null.
fn extract(input: &ComputeInput<'_>) -> Result<Value, String> {
  let pattern = input.arg("pattern")?;
  let regex = Regex::new(pattern).map_err(|e| format!("invalid pattern: {}", e))?;
  let Some(captures) = regex.captures(input.arg("text")?) else {
    return Ok(Value::Null);
  };
  let found = captures.get(1).or_else(|| captures.get(0));
  Ok(found.map_or(Value::Null, |m| Value::String(m.as_str().to_string())))
}

fn length(input: &ComputeInput<'_>) -> Result<Value, String> {
  let len = match parse_output(input.arg("value")?) {
    Value::Array(items) => items.len(),
    Value::Object(map) => map.len(),
    Value::String(s) => s.chars().count(),
    Value::Null => 0,
    other => return Err(format!("cannot take the length of {}", other)),
  };
  Ok(Value::from(len))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn call(name: &str, args: &[(&str, &str)]) -> StepOutcome {
    let inputs = Map::new();
    let results = Map::new();
    let args: BTreeMap<String, String> = args
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    ComputeRegistry::with_builtins().call(
      name,
      &ComputeInput {
        inputs: &inputs,
        results: &results,
        args: &args,
      },
    )
  }

  #[test]
  fn test_collect() {
    let outcome = call("collect", &[("lint", "{\"ok\":true}"), ("state", "opened")]);
    assert_eq!(
      outcome.value(),
      Some(&json!({ "lint": { "ok": true }, "state": "opened" }))
    );
  }

  #[test]
  fn test_split_lines() {
    let outcome = call("split_lines", &[("text", "a\n\n  b  \nc\n")]);
    assert_eq!(outcome.value(), Some(&json!(["a", "b", "c"])));
  }

  #[test]
  fn test_extract() {
    let outcome = call("extract", &[("pattern", r"!(\d+)"), ("text", "see MR !128 for details")]);
    assert_eq!(outcome.value(), Some(&json!("128")));

    let outcome = call("extract", &[("pattern", r"\d+"), ("text", "no digits")]);
    assert_eq!(outcome.value(), Some(&Value::Null));
  }

  #[test]
  fn test_length() {
    assert_eq!(call("length", &[("value", "[1,2,3]")]).value(), Some(&json!(3)));
    assert_eq!(call("length", &[("value", "hello")]).value(), Some(&json!(5)));
    assert_eq!(call("length", &[("value", "true")]).kind(), Some(ErrorKind::InternalFault));
  }

  #[test]
  fn test_errors_are_internal_faults() {
    let outcome = call("parse_json", &[("value", "{not json")]);
    assert_eq!(outcome.kind(), Some(ErrorKind::InternalFault));

    let outcome = call("split_lines", &[]);
    match outcome {
      StepOutcome::Failure { message, .. } => assert!(message.contains("missing argument 'text'")),
      other => panic!("expected failure, got {:?}", other),
    }
  }

  #[test]
  fn test_panic_is_caught() {
    fn boom(_: &ComputeInput<'_>) -> Result<Value, String> {
      panic!("index out of range")
    }

    let mut registry = ComputeRegistry::new();
    registry.register("boom", boom);
    let (inputs, results, args) = (Map::new(), Map::new(), BTreeMap::new());
    let outcome = registry.call(
      "boom",
      &ComputeInput {
        inputs: &inputs,
        results: &results,
        args: &args,
      },
    );
    match outcome {
      StepOutcome::Failure { kind, message, .. } => {
        assert_eq!(kind, ErrorKind::InternalFault);
        assert!(message.contains("index out of range"));
      }
      other => panic!("expected failure, got {:?}", other),
    }
  }

  #[test]
  fn test_unknown_function() {
    assert_eq!(call("eval", &[]).kind(), Some(ErrorKind::DefinitionError));
  }
}
