//! Input validation.
//!
//! Caller-provided inputs are checked against the skill's declarations:
//! required inputs must be present, defaults fill the gaps, and values are
//! coerced to the declared type. Strings are accepted for every type so
//! inputs from command lines and chat messages work unchanged:
//!
//! | type      | accepts                                  |
//! |-----------|------------------------------------------|
//! | `string`  | strings, numbers, booleans               |
//! | `integer` | integers, integer strings                |
//! | `boolean` | booleans, `"true"` / `"false"`           |
//! | `array`   | arrays, strings holding a JSON array     |

use serde_json::{Map, Value};
use skillflow_workflow::{DefinitionError, InputDef, InputType};
use tracing::warn;

/// Validate provided inputs, returning the seeded input map.
pub fn validate_inputs(
  declared: &[InputDef],
  provided: &Map<String, Value>,
) -> Result<Map<String, Value>, DefinitionError> {
  let mut validated = Map::new();

  for input in declared {
    match provided.get(&input.name) {
      Some(value) if !value.is_null() => {
        validated.insert(input.name.clone(), coerce_value(input, value)?);
      }
      _ => {
        if let Some(default) = &input.default {
          validated.insert(input.name.clone(), default.clone());
        } else if input.required {
          return Err(DefinitionError::new(format!(
            "missing required input '{}'",
            input.name
          )));
        }
      }
    }
  }

  for name in provided.keys() {
    if !declared.iter().any(|d| &d.name == name) {
      warn!(input = %name, "undeclared_input_ignored");
    }
  }

  Ok(validated)
}

/// Coerce a single value to the declared input type.
fn coerce_value(input: &InputDef, value: &Value) -> Result<Value, DefinitionError> {
  let mismatch = || {
    DefinitionError::new(format!(
      "input '{}' expected {}, got {}",
      input.name,
      input.input_type.as_str(),
      value
    ))
  };

  match input.input_type {
    InputType::String => match value {
      Value::String(_) => Ok(value.clone()),
      Value::Number(n) => Ok(Value::String(n.to_string())),
      Value::Bool(b) => Ok(Value::String(b.to_string())),
      _ => Err(mismatch()),
    },

    InputType::Integer => match value {
      Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
      Value::String(s) => s
        .trim()
        .parse::<i64>()
        .map(|n| Value::Number(n.into()))
        .map_err(|_| mismatch()),
      _ => Err(mismatch()),
    },

    InputType::Boolean => match value {
      Value::Bool(_) => Ok(value.clone()),
      Value::String(s) => match s.trim().to_lowercase().as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => Err(mismatch()),
      },
      _ => Err(mismatch()),
    },

    InputType::Array => match value {
      Value::Array(_) => Ok(value.clone()),
      Value::String(s) => match serde_json::from_str::<Value>(s) {
        Ok(parsed @ Value::Array(_)) => Ok(parsed),
        _ => Err(mismatch()),
      },
      _ => Err(mismatch()),
    },
  }
}
