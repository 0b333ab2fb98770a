use std::path::PathBuf;

use async_trait::async_trait;
use skillflow_config::DocumentFormat;

use crate::error::StoreError;

/// Raw text of a skill document, as found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillSource {
  pub name: String,
  pub content: String,
  pub format: DocumentFormat,
  /// Where the document was read from, if it lives on disk.
  pub path: Option<PathBuf>,
}

/// Source of skill documents, keyed by skill name.
#[async_trait]
pub trait SkillStore: Send + Sync {
  /// Fetch a document by skill name. Returns `None` if no document exists.
  async fn get(&self, name: &str) -> Result<Option<SkillSource>, StoreError>;

  /// List the names of all available skills, sorted.
  async fn list(&self) -> Result<Vec<String>, StoreError>;
}
