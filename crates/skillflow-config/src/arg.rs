//! Step argument values.
//!
//! Arguments are either literal strings or templates with `{{ ... }}` markers.
//! The distinction is made once, at parse time, so rendering never has to
//! guess what a raw string was meant to be.
//!
//! # Examples
//!
//! ```yaml
//! args:
//!   project: "{{ inputs.project }}"   # Template
//!   iid: "{{ mr.iid }}"               # Template
//!   state: opened                     # Literal
//!   limit: 20                         # Literal("20")
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opening marker of a template expression.
const TEMPLATE_MARKER: &str = "{{";

/// A step argument: either a literal string or a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
  Literal(String),
  Template(String),
}

impl ArgValue {
  /// Classify a raw string as literal or template.
  pub fn from_raw(raw: impl Into<String>) -> Self {
    let raw = raw.into();
    if raw.contains(TEMPLATE_MARKER) {
      Self::Template(raw)
    } else {
      Self::Literal(raw)
    }
  }

  /// The source text of the argument.
  pub fn as_str(&self) -> &str {
    match self {
      Self::Literal(s) | Self::Template(s) => s,
    }
  }

  pub fn is_template(&self) -> bool {
    matches!(self, Self::Template(_))
  }
}

impl From<&str> for ArgValue {
  fn from(raw: &str) -> Self {
    Self::from_raw(raw)
  }
}

impl Serialize for ArgValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for ArgValue {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
      serde_json::Value::String(s) => Self::from_raw(s),
      serde_json::Value::Null => Self::Literal(String::new()),
      // Structured literals are passed to tools as JSON text
      other => Self::Literal(other.to_string()),
    })
  }
}
