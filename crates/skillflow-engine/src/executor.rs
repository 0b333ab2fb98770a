//! Single-step execution.
//!
//! A step moves through: condition check (skip or run), argument
//! rendering, dispatch, and on failure classification, remediation and at
//! most the policy's number of retries. The executor never touches the
//! execution context; it returns a `StepReport` the engine applies.

use std::sync::Arc;
use std::time::Duration;

use skillflow_dispatch::{DispatchRequest, ErrorKind, NO_CATEGORY, StepOutcome, ToolDispatcher};
use skillflow_expr::Evaluator;
use skillflow_heal::{AutoHealController, RetryLedger};
use skillflow_workflow::{Operation, Step};
use tracing::{debug, info, instrument, warn};

use crate::context::{ContextSnapshot, FailureRecord};
use crate::events::{ExecutionLogger, RunRecord, SkipReason};

/// Whether a step ran and how it ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepDisposition {
  /// The condition evaluated false.
  Skipped,
  /// The step ran; this is its final outcome.
  Ran(StepOutcome),
}

/// Everything the engine needs to apply one step's execution.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
  pub disposition: StepDisposition,
  /// One record per failed attempt, in order.
  pub failures: Vec<FailureRecord>,
}

impl StepReport {
  /// The final failure kind, if the step ran and failed.
  pub fn failure_kind(&self) -> Option<ErrorKind> {
    match &self.disposition {
      StepDisposition::Ran(outcome) => outcome.kind(),
      StepDisposition::Skipped => None,
    }
  }
}

/// Drives individual steps. Cheap to clone; clones share collaborators.
#[derive(Clone)]
pub struct StepExecutor {
  dispatcher: Arc<ToolDispatcher>,
  heal: Arc<AutoHealController>,
  evaluator: Arc<Evaluator>,
  logger: Arc<dyn ExecutionLogger>,
  step_timeout: Duration,
}

impl StepExecutor {
  pub fn new(
    dispatcher: Arc<ToolDispatcher>,
    heal: Arc<AutoHealController>,
    evaluator: Arc<Evaluator>,
    logger: Arc<dyn ExecutionLogger>,
    step_timeout: Duration,
  ) -> Self {
    Self {
      dispatcher,
      heal,
      evaluator,
      logger,
      step_timeout,
    }
  }

  /// Execute one step against a context snapshot.
  #[instrument(
    name = "step_execute",
    skip(self, step, snapshot),
    fields(run_id = %run_id, step = %step.name)
  )]
  pub async fn execute(&self, run_id: &str, step: &Step, snapshot: &ContextSnapshot) -> StepReport {
    if let Some(condition) = &step.condition {
      match self.evaluator.eval_condition(condition, &snapshot.scope) {
        Ok(true) => {}
        Ok(false) => {
          debug!(condition = %condition, "step_skipped");
          self.logger.append(
            run_id,
            RunRecord::StepSkipped {
              step: step.name.clone(),
              reason: SkipReason::Condition,
            },
          );
          return StepReport {
            disposition: StepDisposition::Skipped,
            failures: Vec::new(),
          };
        }
        Err(e) => {
          return self.fault(run_id, step, format!("failed to evaluate condition: {}", e));
        }
      }
    }

    let args = match self.evaluator.render_args(&step.args, &snapshot.scope) {
      Ok(args) => args,
      Err(e) => return self.fault(run_id, step, e.to_string()),
    };

    let category = match &step.operation {
      Operation::External(name) => self.dispatcher.category_of(name),
      Operation::Compute(_) => NO_CATEGORY,
    };
    let timeout = step
      .timeout_ms
      .map(Duration::from_millis)
      .unwrap_or(self.step_timeout);
    let request = DispatchRequest {
      args: &args,
      inputs: &snapshot.inputs,
      results: &snapshot.results,
      timeout,
    };

    let mut ledger = RetryLedger::new();
    let mut failures = Vec::new();
    let mut attempt: u32 = 1;

    let outcome = loop {
      self.logger.append(
        run_id,
        RunRecord::StepStarted {
          step: step.name.clone(),
          operation: step.operation.to_string(),
          attempt,
        },
      );
      info!(operation = %step.operation, attempt, "step_dispatched");

      let (kind, message, raw) = match self.dispatcher.invoke(&step.operation, &request).await {
        StepOutcome::Failure { kind, message, raw } => (kind, message, raw),
        success => break success,
      };

      let kind = match kind {
        ErrorKind::Unclassified => self.heal.classify_for(category, &message),
        known => known,
      };
      warn!(kind = %kind, error = %message, attempt, "step_failed");

      let remediation = self
        .heal
        .remediate(category, kind, &self.dispatcher, &mut ledger)
        .await;
      if let Some(operation) = &remediation.operation {
        self.logger.append(
          run_id,
          RunRecord::RemediationAttempted {
            step: step.name.clone(),
            operation: operation.clone(),
            error_kind: kind,
            outcome: remediation.outcome,
          },
        );
      }
      let retry = self
        .heal
        .should_retry(category, kind, &ledger, remediation.outcome);

      failures.push(FailureRecord {
        remediation_attempted: remediation.attempted(),
        remediation_outcome: remediation.outcome,
        remediation_operation: remediation.operation,
        remediation_message: remediation.message,
        ..FailureRecord::new(
          &step.name,
          Some(step.operation.to_string()),
          kind,
          message.clone(),
          attempt,
        )
      });

      if !retry {
        break StepOutcome::Failure { kind, message, raw };
      }
      ledger.record_retry();
      attempt += 1;
      info!(attempt, "step_retrying");
    };

    let record = match &outcome {
      StepOutcome::Success { .. } => RunRecord::StepCompleted {
        step: step.name.clone(),
        attempts: attempt,
      },
      StepOutcome::Failure { kind, message, .. } => RunRecord::StepFailed {
        step: step.name.clone(),
        error_kind: *kind,
        message: message.clone(),
        attempts: attempt,
      },
    };
    self.logger.append(run_id, record);

    StepReport {
      disposition: StepDisposition::Ran(outcome),
      failures,
    }
  }

  /// A failure raised inside the engine before dispatch.
  fn fault(&self, run_id: &str, step: &Step, message: String) -> StepReport {
    warn!(error = %message, "step_fault");
    self.logger.append(
      run_id,
      RunRecord::StepFailed {
        step: step.name.clone(),
        error_kind: ErrorKind::InternalFault,
        message: message.clone(),
        attempts: 0,
      },
    );
    StepReport {
      disposition: StepDisposition::Ran(StepOutcome::failure(ErrorKind::InternalFault, message.clone())),
      failures: vec![FailureRecord::new(
        &step.name,
        Some(step.operation.to_string()),
        ErrorKind::InternalFault,
        message,
        1,
      )],
    }
  }
}
