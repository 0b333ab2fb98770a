//! Execution records and loggers.
//!
//! The engine appends a record for each run and step transition. Loggers
//! decide what to do with them (persist, stream, ignore). Appending never
//! blocks a run and logger failures never affect its result.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillflow_dispatch::ErrorKind;
use skillflow_heal::RemediationOutcome;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::EngineError;
use crate::result::RunStatus;

/// Why a step did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  /// The step's condition evaluated false.
  Condition,
  /// The run was cancelled before the step started.
  Cancelled,
}

/// Records appended during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunRecord {
  RunStarted {
    skill: String,
    version: String,
    digest: String,
    inputs: Value,
  },
  StepStarted {
    step: String,
    operation: String,
    attempt: u32,
  },
  StepSkipped {
    step: String,
    reason: SkipReason,
  },
  StepCompleted {
    step: String,
    attempts: u32,
  },
  StepFailed {
    step: String,
    error_kind: ErrorKind,
    message: String,
    attempts: u32,
  },
  RemediationAttempted {
    step: String,
    operation: String,
    error_kind: ErrorKind,
    outcome: RemediationOutcome,
  },
  RunFinished {
    status: RunStatus,
    steps_run: usize,
    steps_skipped: usize,
    failures: usize,
  },
}

/// A record with its run and time of append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub run_id: String,
  pub timestamp: DateTime<Utc>,
  #[serde(flatten)]
  pub record: RunRecord,
}

impl LogEntry {
  pub fn new(run_id: &str, record: RunRecord) -> Self {
    Self {
      run_id: run_id.to_string(),
      timestamp: Utc::now(),
      record,
    }
  }
}

/// Durable record of runs for later inspection.
///
/// `append` is fire-and-forget: implementations must not block and must
/// swallow their own failures.
pub trait ExecutionLogger: Send + Sync {
  fn append(&self, run_id: &str, record: RunRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Default)]
pub struct NoopLogger;

impl ExecutionLogger for NoopLogger {
  fn append(&self, _run_id: &str, _record: RunRecord) {}
}

/// Sends records to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelLogger {
  sender: mpsc::UnboundedSender<LogEntry>,
}

impl ChannelLogger {
  pub fn new(sender: mpsc::UnboundedSender<LogEntry>) -> Self {
    Self { sender }
  }

  /// A logger and the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionLogger for ChannelLogger {
  fn append(&self, run_id: &str, record: RunRecord) {
    // Receiver may have been dropped
    let _ = self.sender.send(LogEntry::new(run_id, record));
  }
}

/// Appends records as JSON lines to `{dir}/{run_id}.jsonl`.
///
/// Writes happen on a background task. The task ends once every clone of
/// the logger is dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct JsonlLogger {
  sender: mpsc::UnboundedSender<LogEntry>,
}

impl JsonlLogger {
  /// Create the log directory and start the writer task.
  pub async fn spawn(dir: impl Into<PathBuf>) -> Result<(Self, JoinHandle<()>), EngineError> {
    let dir = dir.into();
    tokio::fs::create_dir_all(&dir)
      .await
      .map_err(|source| EngineError::LogDir {
        path: dir.clone(),
        source,
      })?;

    let (sender, receiver) = mpsc::unbounded_channel();
    let handle = tokio::spawn(write_entries(dir, receiver));
    Ok((Self { sender }, handle))
  }
}

impl ExecutionLogger for JsonlLogger {
  fn append(&self, run_id: &str, record: RunRecord) {
    let _ = self.sender.send(LogEntry::new(run_id, record));
  }
}

async fn write_entries(dir: PathBuf, mut receiver: mpsc::UnboundedReceiver<LogEntry>) {
  let mut files: HashMap<String, File> = HashMap::new();

  while let Some(entry) = receiver.recv().await {
    let finished = matches!(entry.record, RunRecord::RunFinished { .. });
    let run_id = entry.run_id.clone();

    if let Err(e) = write_entry(&dir, &mut files, &entry).await {
      warn!(run_id = %run_id, error = %e, "execution_log_write_failed");
    }

    if finished && let Some(mut file) = files.remove(&run_id) {
      if let Err(e) = file.flush().await {
        warn!(run_id = %run_id, error = %e, "execution_log_flush_failed");
      }
    }
  }

  for (run_id, mut file) in files {
    if let Err(e) = file.flush().await {
      warn!(run_id = %run_id, error = %e, "execution_log_flush_failed");
    }
  }
}

async fn write_entry(
  dir: &Path,
  files: &mut HashMap<String, File>,
  entry: &LogEntry,
) -> std::io::Result<()> {
  let mut line = serde_json::to_vec(entry)?;
  line.push(b'\n');

  if !files.contains_key(&entry.run_id) {
    let path = dir.join(format!("{}.jsonl", entry.run_id));
    let file = OpenOptions::new().create(true).append(true).open(&path).await?;
    files.insert(entry.run_id.clone(), file);
  }

  match files.get_mut(&entry.run_id) {
    Some(file) => file.write_all(&line).await,
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_entry_serialization() {
    let entry = LogEntry::new(
      "run-1",
      RunRecord::StepSkipped {
        step: "lint".to_string(),
        reason: SkipReason::Condition,
      },
    );
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["run_id"], "run-1");
    assert_eq!(value["event"], "step_skipped");
    assert_eq!(value["step"], "lint");
    assert_eq!(value["reason"], "condition");
  }

  #[tokio::test]
  async fn test_channel_logger() {
    let (logger, mut receiver) = ChannelLogger::channel();
    logger.append(
      "run-1",
      RunRecord::StepCompleted {
        step: "fetch".to_string(),
        attempts: 1,
      },
    );
    let entry = receiver.recv().await.unwrap();
    assert_eq!(entry.run_id, "run-1");
    assert!(matches!(entry.record, RunRecord::StepCompleted { attempts: 1, .. }));

    drop(receiver);
    // Sending after the receiver is gone is silently ignored
    logger.append("run-1", RunRecord::StepSkipped { step: "x".to_string(), reason: SkipReason::Cancelled });
  }

  #[tokio::test]
  async fn test_jsonl_logger_writes_lines() {
    let dir = tempfile::tempdir().unwrap();
    let (logger, handle) = JsonlLogger::spawn(dir.path().join("runs")).await.unwrap();

    logger.append(
      "abc",
      RunRecord::StepStarted {
        step: "fetch".to_string(),
        operation: "get_mr".to_string(),
        attempt: 1,
      },
    );
    logger.append(
      "abc",
      RunRecord::RunFinished {
        status: RunStatus::Completed,
        steps_run: 1,
        steps_skipped: 0,
        failures: 0,
      },
    );
    drop(logger);
    handle.await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("runs").join("abc.jsonl")).unwrap();
    let lines: Vec<Value> = content
      .lines()
      .map(|l| serde_json::from_str(l).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "step_started");
    assert_eq!(lines[1]["event"], "run_finished");
    assert_eq!(lines[1]["status"]["state"], "completed");
  }
}
