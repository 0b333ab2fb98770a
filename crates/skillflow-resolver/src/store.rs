use std::collections::HashMap;
use std::sync::Arc;

use skillflow_config::SkillDef;
use skillflow_store::{SkillSource, SkillStore};
use skillflow_workflow::{DefinitionError, WorkflowDefinition};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::digest::content_digest;
use crate::resolver::Resolver;

/// Get-or-load access to validated definitions.
///
/// Definitions are cached by skill name together with the digest of the
/// document they were built from. Every load re-reads the document and
/// reuses the cached definition only if the content is unchanged, so
/// edits on disk take effect on the next run.
pub struct DefinitionStore {
  store: Arc<dyn SkillStore>,
  resolver: Arc<dyn Resolver>,
  cache: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl DefinitionStore {
  pub fn new(store: Arc<dyn SkillStore>, resolver: Arc<dyn Resolver>) -> Self {
    Self {
      store,
      resolver,
      cache: RwLock::new(HashMap::new()),
    }
  }

  /// Load a definition by skill name.
  pub async fn load(&self, name: &str) -> Result<Arc<WorkflowDefinition>, DefinitionError> {
    let source = self
      .store
      .get(name)
      .await
      .map_err(|e| DefinitionError::new(format!("failed to read skill '{}': {}", name, e)))?
      .ok_or_else(|| DefinitionError::new(format!("skill '{}' not found", name)))?;

    let digest = content_digest(&source.content);

    {
      let cache = self.cache.read().await;
      if let Some(cached) = cache.get(name)
        && cached.digest == digest
      {
        debug!(skill = %name, digest = %digest, "definition_cache_hit");
        return Ok(cached.clone());
      }
    }

    let definition = Arc::new(self.resolve_source(&source, digest)?);

    {
      let mut cache = self.cache.write().await;
      cache.insert(name.to_string(), definition.clone());
    }

    Ok(definition)
  }

  /// Parse and validate a document without touching the cache.
  pub fn resolve_source(
    &self,
    source: &SkillSource,
    digest: String,
  ) -> Result<WorkflowDefinition, DefinitionError> {
    let def = SkillDef::parse(&source.content, source.format).map_err(|e| {
      DefinitionError::new(format!("failed to parse skill '{}': {}", source.name, e))
    })?;

    if def.name != source.name {
      warn!(
        skill = %source.name,
        declared = %def.name,
        "skill_name_mismatch"
      );
    }

    self.resolver.resolve(def, digest)
  }

  /// Names of every skill the underlying store knows about.
  pub async fn list(&self) -> Result<Vec<String>, DefinitionError> {
    self
      .store
      .list()
      .await
      .map_err(|e| DefinitionError::new(format!("failed to list skills: {}", e)))
  }

  /// Drop every cached definition.
  pub async fn clear_cache(&self) {
    self.cache.write().await.clear();
  }
}
