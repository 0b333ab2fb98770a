use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::SettingsError;
use crate::settings::{Settings, default_home};

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "SKILLFLOW_CONFIG";

const SKILLS_DIR_ENV: &str = "SKILLFLOW_SKILLS_DIR";
const LOG_LEVEL_ENV: &str = "SKILLFLOW_LOG_LEVEL";
const PERSONA_ENV: &str = "SKILLFLOW_PERSONA";

/// Locates, reads and validates `skillflow.toml`.
pub struct SettingsLoader;

impl SettingsLoader {
  /// Resolve the settings path: explicit path > SKILLFLOW_CONFIG >
  /// ~/.skillflow/skillflow.toml
  pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    Self::resolve_path_with(explicit, |key| std::env::var(key).ok())
  }

  /// Load settings from disk with environment overrides applied.
  pub fn load(explicit: Option<&Path>) -> Result<(Settings, PathBuf), SettingsError> {
    Self::load_with(explicit, |key| std::env::var(key).ok())
  }

  /// Like [`SettingsLoader::load`] with a custom environment lookup.
  pub fn load_with(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
  ) -> Result<(Settings, PathBuf), SettingsError> {
    let path = Self::resolve_path_with(explicit, &env);

    let settings = if path.exists() {
      info!(path = %path.display(), "settings_loading");
      let raw = std::fs::read_to_string(&path).map_err(|source| SettingsError::Read {
        path: path.clone(),
        source,
      })?;
      toml::from_str::<Settings>(&raw).map_err(|e| SettingsError::Parse {
        path: path.clone(),
        message: e.to_string(),
      })?
    } else if explicit.is_some() {
      // An explicitly named file must exist
      return Err(SettingsError::Read {
        path,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
      });
    } else {
      info!(path = %path.display(), "settings_file_not_found_using_defaults");
      Settings::default()
    };

    let settings = Self::apply_env_overrides(settings, &env);

    match settings.validate() {
      Ok(warnings) => {
        for warning in &warnings {
          warn!(warning = %warning, "settings_warning");
        }
      }
      Err(message) => return Err(SettingsError::Invalid { message }),
    }

    Ok((settings, path))
  }

  fn resolve_path_with(explicit: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = explicit {
      return path.to_path_buf();
    }
    if let Some(path) = env(CONFIG_ENV).filter(|p| !p.is_empty()) {
      return PathBuf::from(path);
    }
    default_home().join("skillflow.toml")
  }

  fn apply_env_overrides(mut settings: Settings, env: impl Fn(&str) -> Option<String>) -> Settings {
    if let Some(dir) = env(SKILLS_DIR_ENV) {
      settings.engine.skills_dir = PathBuf::from(dir);
    }
    if let Some(level) = env(LOG_LEVEL_ENV) {
      settings.logging.level = level;
    }
    if let Some(persona) = env(PERSONA_ENV) {
      settings.session.persona = Some(persona);
    }
    settings
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key: &str| vars.get(key).cloned()
  }

  #[test]
  fn test_resolve_path_precedence() {
    let explicit = Path::new("/etc/skillflow.toml");
    let from_env = env(&[(CONFIG_ENV, "/opt/skillflow.toml")]);

    assert_eq!(
      SettingsLoader::resolve_path_with(Some(explicit), &from_env),
      PathBuf::from("/etc/skillflow.toml")
    );
    assert_eq!(
      SettingsLoader::resolve_path_with(None, &from_env),
      PathBuf::from("/opt/skillflow.toml")
    );
    assert!(
      SettingsLoader::resolve_path_with(None, env(&[]))
        .ends_with(".skillflow/skillflow.toml")
    );
  }

  #[test]
  fn test_missing_default_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skillflow.toml");
    let lookup = env(&[(CONFIG_ENV, path.to_str().unwrap())]);

    let (settings, resolved) = SettingsLoader::load_with(None, lookup).unwrap();
    assert_eq!(resolved, path);
    assert_eq!(settings, Settings::default());
  }

  #[test]
  fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = SettingsLoader::load_with(Some(path.as_path()), env(&[])).unwrap_err();
    assert!(matches!(err, SettingsError::Read { .. }));
  }

  #[test]
  fn test_load_with_env_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skillflow.toml");
    std::fs::write(
      &path,
      "[engine]\nskills_dir = \"/srv/skills\"\n\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();

    let lookup = env(&[
      (LOG_LEVEL_ENV, "debug"),
      (PERSONA_ENV, "release-manager"),
    ]);
    let (settings, _) = SettingsLoader::load_with(Some(path.as_path()), lookup).unwrap();

    assert_eq!(settings.engine.skills_dir, PathBuf::from("/srv/skills"));
    assert_eq!(settings.logging.level, "debug");
    assert_eq!(settings.session.persona.as_deref(), Some("release-manager"));

    let lookup = env(&[(SKILLS_DIR_ENV, "/tmp/skills")]);
    let (settings, _) = SettingsLoader::load_with(Some(path.as_path()), lookup).unwrap();
    assert_eq!(settings.engine.skills_dir, PathBuf::from("/tmp/skills"));
    assert_eq!(settings.logging.level, "warn");
  }

  #[test]
  fn test_parse_error_names_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skillflow.toml");
    std::fs::write(&path, "[engine\n").unwrap();

    let err = SettingsLoader::load_with(Some(path.as_path()), env(&[])).unwrap_err();
    match err {
      SettingsError::Parse { path: p, .. } => assert_eq!(p, path),
      other => panic!("expected parse error, got {:?}", other),
    }
  }

  #[test]
  fn test_invalid_settings_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skillflow.toml");
    std::fs::write(&path, "[engine]\nstep_timeout_ms = 0\n").unwrap();

    let err = SettingsLoader::load_with(Some(path.as_path()), env(&[])).unwrap_err();
    assert!(matches!(err, SettingsError::Invalid { .. }));
  }
}
