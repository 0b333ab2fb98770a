use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::handler::{OperationFailure, OperationHandler, substitute};

/// Runs an external program, one process per call.
///
/// Program arguments may contain `{name}` placeholders that are filled
/// from the step's rendered arguments:
///
/// ```toml
/// [operations.get_mr]
/// kind = "command"
/// program = "glab"
/// args = ["mr", "view", "{iid}", "--repo", "{project}", "--output", "json"]
/// ```
///
/// A zero exit status yields stdout. Anything else is a failure whose
/// message is stderr (or stdout when stderr is empty). The child is
/// killed if the call is dropped, so dispatch timeouts never leak
/// processes.
#[derive(Debug, Clone)]
pub struct CommandHandler {
  program: String,
  args: Vec<String>,
  env: BTreeMap<String, String>,
  working_dir: Option<PathBuf>,
}

impl CommandHandler {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      env: BTreeMap::new(),
      working_dir: None,
    }
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args = args.into_iter().map(Into::into).collect();
    self
  }

  pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
    self.env = env;
    self
  }

  pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
    self.working_dir = dir;
    self
  }
}

#[async_trait]
impl OperationHandler for CommandHandler {
  async fn invoke(&self, args: &BTreeMap<String, String>) -> Result<String, OperationFailure> {
    let mut command = Command::new(&self.program);
    command
      .args(self.args.iter().map(|a| substitute(a, args)))
      .envs(&self.env)
      .stdin(Stdio::null())
      .kill_on_drop(true);
    if let Some(dir) = &self.working_dir {
      command.current_dir(dir);
    }

    let output = command
      .output()
      .await
      .map_err(|e| OperationFailure::new(format!("failed to start '{}': {}", self.program, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
      return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let message = match (stderr.trim(), stdout.trim()) {
      ("", "") => match output.status.code() {
        Some(code) => format!("'{}' exited with status {}", self.program, code),
        None => format!("'{}' was terminated by a signal", self.program),
      },
      ("", out) => out.to_string(),
      (err, _) => err.to_string(),
    };

    let mut raw = stdout;
    raw.push_str(&stderr);
    Err(OperationFailure::new(message).with_raw(raw))
  }
}
