use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use skillflow_config::DocumentFormat;
use tokio::fs;

use crate::error::StoreError;
use crate::store::{SkillSource, SkillStore};

/// Filesystem-based skill store.
///
/// Skills are flat files named after the skill:
/// ```text
/// {root}/
/// ├── review_mr.yaml
/// ├── deploy_check.yml
/// └── summarize.json
/// ```
///
/// When several files share a name, extensions are tried in the order
/// `yaml`, `yml`, `json`.
pub struct FsSkillStore {
  root: PathBuf,
}

impl FsSkillStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Skill names map directly to file names, so path separators and
  /// parent references are refused.
  fn check_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
      && !name.starts_with('.')
      && name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
      Ok(())
    } else {
      Err(StoreError::InvalidName {
        name: name.to_string(),
      })
    }
  }
}

#[async_trait]
impl SkillStore for FsSkillStore {
  async fn get(&self, name: &str) -> Result<Option<SkillSource>, StoreError> {
    Self::check_name(name)?;

    for ext in DocumentFormat::EXTENSIONS {
      let path = self.root.join(format!("{}.{}", name, ext));
      match fs::read_to_string(&path).await {
        Ok(content) => {
          let format = DocumentFormat::from_path(&path).unwrap_or(DocumentFormat::Yaml);
          return Ok(Some(SkillSource {
            name: name.to_string(),
            content,
            format,
            path: Some(path),
          }));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => continue,
        Err(source) => return Err(StoreError::Read { path, source }),
      }
    }

    Ok(None)
  }

  async fn list(&self) -> Result<Vec<String>, StoreError> {
    let mut names = BTreeSet::new();

    let mut entries = match fs::read_dir(&self.root).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if DocumentFormat::from_path(&path).is_none() {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
        && Self::check_name(stem).is_ok()
      {
        names.insert(stem.to_string());
      }
    }

    Ok(names.into_iter().collect())
  }
}
