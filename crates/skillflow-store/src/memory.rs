use std::collections::BTreeMap;

use async_trait::async_trait;
use skillflow_config::DocumentFormat;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{SkillSource, SkillStore};

/// In-memory skill store, used by tests and embedders that build skills
/// programmatically.
#[derive(Default)]
pub struct MemorySkillStore {
  skills: RwLock<BTreeMap<String, (String, DocumentFormat)>>,
}

impl MemorySkillStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or replace a document.
  pub async fn insert(&self, name: impl Into<String>, content: impl Into<String>, format: DocumentFormat) {
    self
      .skills
      .write()
      .await
      .insert(name.into(), (content.into(), format));
  }

  pub async fn insert_yaml(&self, name: impl Into<String>, content: impl Into<String>) {
    self.insert(name, content, DocumentFormat::Yaml).await;
  }

  pub async fn remove(&self, name: &str) -> bool {
    self.skills.write().await.remove(name).is_some()
  }
}

#[async_trait]
impl SkillStore for MemorySkillStore {
  async fn get(&self, name: &str) -> Result<Option<SkillSource>, StoreError> {
    let skills = self.skills.read().await;
    Ok(skills.get(name).map(|(content, format)| SkillSource {
      name: name.to_string(),
      content: content.clone(),
      format: *format,
      path: None,
    }))
  }

  async fn list(&self) -> Result<Vec<String>, StoreError> {
    Ok(self.skills.read().await.keys().cloned().collect())
  }
}
