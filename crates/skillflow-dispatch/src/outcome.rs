use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
  /// A required environment could not be reached.
  NetworkUnreachable,
  /// Authentication or authorization was rejected.
  CredentialExpired,
  /// The dispatch exceeded its allotted time.
  Timeout,
  /// The operation ran and reported a domain-level failure.
  ExternalOperationError,
  /// An inline compute function failed or panicked.
  InternalFault,
  /// Load-time or input-validation failure.
  DefinitionError,
  /// No detector matched the failure text.
  Unclassified,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::NetworkUnreachable => "NetworkUnreachable",
      Self::CredentialExpired => "CredentialExpired",
      Self::Timeout => "Timeout",
      Self::ExternalOperationError => "ExternalOperationError",
      Self::InternalFault => "InternalFault",
      Self::DefinitionError => "DefinitionError",
      Self::Unclassified => "Unclassified",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
  Success {
    value: Value,
  },
  Failure {
    kind: ErrorKind,
    message: String,
    /// Unprocessed output of the operation, when there was any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
  },
}

impl StepOutcome {
  pub fn success(value: Value) -> Self {
    Self::Success { value }
  }

  pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self::Failure {
      kind,
      message: message.into(),
      raw: None,
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, Self::Success { .. })
  }

  /// The success value, if any.
  pub fn value(&self) -> Option<&Value> {
    match self {
      Self::Success { value } => Some(value),
      Self::Failure { .. } => None,
    }
  }

  /// The failure kind, if any.
  pub fn kind(&self) -> Option<ErrorKind> {
    match self {
      Self::Success { .. } => None,
      Self::Failure { kind, .. } => Some(*kind),
    }
  }
}

/// Convert raw operation output into a value.
///
/// Output that parses as JSON becomes structured data so templates can
/// reach into it; anything else is kept as a trimmed string.
pub fn parse_output(raw: &str) -> Value {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Value::String(String::new());
  }
  serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
