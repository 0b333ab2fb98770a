use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skillflow_dispatch::{OperationSpec, Session};
use skillflow_heal::PolicySpec;

/// Contents of `skillflow.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
  pub engine: EngineSettings,
  pub session: Session,
  pub logging: LoggingSettings,
  /// External operations by name.
  pub operations: BTreeMap<String, OperationSpec>,
  /// Auto-heal policies by operation category. Layered over the built-in
  /// tunnel and credential policies.
  pub auto_heal: BTreeMap<String, PolicySpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
  /// Directory holding skill documents.
  pub skills_dir: PathBuf,
  pub step_timeout_ms: u64,
  /// Whole-run limit; unset means unbounded.
  pub run_timeout_ms: Option<u64>,
  pub max_parallel: usize,
  /// Where execution records are written as JSON lines. Unset disables
  /// the execution log.
  pub log_dir: Option<PathBuf>,
}

impl EngineSettings {
  pub fn step_timeout(&self) -> Duration {
    Duration::from_millis(self.step_timeout_ms)
  }

  pub fn run_timeout(&self) -> Option<Duration> {
    self.run_timeout_ms.map(Duration::from_millis)
  }
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      skills_dir: default_home().join("skills"),
      step_timeout_ms: 300_000,
      run_timeout_ms: None,
      max_parallel: 4,
      log_dir: None,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
  #[default]
  Pretty,
  Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
  /// Filter directive used when `RUST_LOG` is unset.
  pub level: String,
  pub format: LogFormat,
}

impl Default for LoggingSettings {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      format: LogFormat::Pretty,
    }
  }
}

/// `~/.skillflow`, or `./.skillflow` when there is no home directory.
pub(crate) fn default_home() -> PathBuf {
  dirs::home_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join(".skillflow")
}

impl Settings {
  /// Check the settings for problems.
  ///
  /// Returns warnings for questionable values and an error for values the
  /// engine cannot run with.
  pub fn validate(&self) -> Result<Vec<String>, String> {
    let mut warnings = Vec::new();

    if self.engine.max_parallel == 0 {
      warnings.push("engine.max_parallel is 0; fan-out groups will run one step at a time".to_string());
    }
    if self.engine.step_timeout_ms == 0 {
      return Err("engine.step_timeout_ms must be greater than 0".to_string());
    }
    if self.engine.run_timeout_ms == Some(0) {
      return Err("engine.run_timeout_ms must be greater than 0".to_string());
    }

    for (category, policy) in &self.auto_heal {
      if let Some(operation) = &policy.remediation_operation
        && !self.operations.contains_key(operation)
      {
        warnings.push(format!(
          "auto_heal.{} remediation operation '{}' is not a configured operation",
          category, operation
        ));
      }
    }

    for name in &self.session.tools {
      if !self.operations.contains_key(name) {
        warnings.push(format!("session tool '{}' is not a configured operation", name));
      }
    }

    Ok(warnings)
  }
}

#[cfg(test)]
mod tests {
  use skillflow_dispatch::HandlerSpec;

  use super::*;

  const FULL: &str = r#"
[engine]
skills_dir = "/srv/skills"
step_timeout_ms = 60000
run_timeout_ms = 600000
max_parallel = 8
log_dir = "/var/log/skillflow"

[session]
persona = "developer"
tools = ["get_mr", "vpn_connect"]

[logging]
level = "debug"
format = "json"

[operations.get_mr]
kind = "command"
program = "glab"
args = ["mr", "view", "{mr_id}", "--output", "json"]
category = "network-tunnel-dependent"

[operations.vpn_connect]
kind = "command"
program = "vpn-up"

[operations.pods]
kind = "http"
url = "https://k8s.internal/api/v1/namespaces/{namespace}/pods"
category = "credential-dependent"

[auto_heal.network-tunnel-dependent]
remediation_operation = "vpn_connect"
remediable = ["NetworkUnreachable"]
max_retries = 2
detectors = [{ pattern = "tunnel down", kind = "NetworkUnreachable" }]
"#;

  #[test]
  fn test_parse_full() {
    let settings: Settings = toml::from_str(FULL).unwrap();

    assert_eq!(settings.engine.skills_dir, PathBuf::from("/srv/skills"));
    assert_eq!(settings.engine.step_timeout(), Duration::from_secs(60));
    assert_eq!(settings.engine.run_timeout(), Some(Duration::from_secs(600)));
    assert_eq!(settings.engine.max_parallel, 8);
    assert_eq!(settings.session.persona.as_deref(), Some("developer"));
    assert!(settings.session.allows("get_mr"));
    assert!(!settings.session.allows("pods"));
    assert_eq!(settings.logging.format, LogFormat::Json);

    let get_mr = &settings.operations["get_mr"];
    assert_eq!(get_mr.category, "network-tunnel-dependent");
    assert!(matches!(&get_mr.handler, HandlerSpec::Command { program, .. } if program == "glab"));
    assert_eq!(settings.operations["vpn_connect"].category, "none");
    assert!(matches!(settings.operations["pods"].handler, HandlerSpec::Http { .. }));

    let policy = &settings.auto_heal["network-tunnel-dependent"];
    assert_eq!(policy.max_retries, 2);
    assert_eq!(policy.detectors.len(), 1);
  }

  #[test]
  fn test_empty_document_is_default() {
    let settings: Settings = toml::from_str("").unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.engine.max_parallel, 4);
    assert_eq!(settings.logging.level, "info");
  }

  #[test]
  fn test_unknown_field_rejected() {
    assert!(toml::from_str::<Settings>("[engine]\nthreads = 4\n").is_err());
  }

  #[test]
  fn test_validate_full_is_clean() {
    let settings: Settings = toml::from_str(FULL).unwrap();
    assert_eq!(settings.validate().unwrap(), Vec::<String>::new());
  }

  #[test]
  fn test_validate_warnings() {
    let settings: Settings = toml::from_str(
      r#"
[engine]
max_parallel = 0

[session]
tools = ["ghost"]

[auto_heal.credential-dependent]
remediation_operation = "kube_login"
"#,
    )
    .unwrap();

    let warnings = settings.validate().unwrap();
    assert_eq!(warnings.len(), 3);
    assert!(warnings[0].contains("max_parallel"));
    assert!(warnings[1].contains("'kube_login'"));
    assert!(warnings[2].contains("'ghost'"));
  }

  #[test]
  fn test_validate_zero_step_timeout() {
    let settings: Settings = toml::from_str("[engine]\nstep_timeout_ms = 0\n").unwrap();
    assert!(settings.validate().is_err());
  }
}
