use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The caller's identity and tool allow-list for a run.
///
/// Passed to the dispatcher at construction; tool availability is a lookup
/// against this value. An empty allow-list permits every registered
/// operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub persona: Option<String>,
  #[serde(default)]
  pub tools: BTreeSet<String>,
}

impl Session {
  pub fn new(persona: Option<String>, tools: impl IntoIterator<Item = String>) -> Self {
    Self {
      persona,
      tools: tools.into_iter().collect(),
    }
  }

  pub fn allows(&self, operation: &str) -> bool {
    self.tools.is_empty() || self.tools.contains(operation)
  }
}
