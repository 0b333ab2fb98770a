use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};
use skillflow_dispatch::{ErrorKind, StepOutcome, ToolDispatcher};
use skillflow_expr::Evaluator;
use skillflow_heal::AutoHealController;
use skillflow_workflow::{OnError, Stage, Step, WorkflowDefinition};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::context::{ContextSnapshot, ExecutionContext, FailureRecord};
use crate::events::{ExecutionLogger, NoopLogger, RunRecord, SkipReason};
use crate::executor::{StepDisposition, StepExecutor, StepReport};
use crate::inputs::validate_inputs;
use crate::result::{OUTPUTS_STEP, RunStatus, WorkflowResult};

/// Engine limits.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Dispatch timeout for steps without their own `timeout_ms`.
  pub step_timeout: Duration,
  /// Whole-run timeout. `None` means unbounded.
  pub run_timeout: Option<Duration>,
  /// Fan-out group members dispatched at once.
  pub max_parallel: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      step_timeout: Duration::from_secs(300),
      run_timeout: None,
      max_parallel: 4,
    }
  }
}

/// How a fan-out member's task ended.
enum MemberEnd {
  Done(StepReport),
  /// Cancelled while dispatching.
  Interrupted,
  /// Cancelled before it acquired a slot.
  NotStarted,
}

/// Mutable bookkeeping for one run.
struct RunState {
  run_id: String,
  context: ExecutionContext,
  steps_run: Vec<String>,
  steps_skipped: Vec<String>,
  not_started: Vec<String>,
  aborted: Option<(String, ErrorKind)>,
  cancelled: bool,
}

impl RunState {
  /// Apply a finished step. Records its output, failures and run/skip
  /// status, and notes an abort for `on_error: fail`.
  fn apply(&mut self, step: &Step, report: StepReport) {
    if let Some(kind) = report.failure_kind()
      && step.on_error == OnError::Fail
      && self.aborted.is_none()
    {
      self.aborted = Some((step.name.clone(), kind));
    }
    self.context.append_failures(report.failures);
    match report.disposition {
      StepDisposition::Skipped => self.steps_skipped.push(step.name.clone()),
      StepDisposition::Ran(outcome) => {
        self.steps_run.push(step.name.clone());
        if let Some(output) = &step.output {
          self.context.record(output, outcome);
        }
      }
    }
  }

  /// A step whose dispatch was cut off by cancellation.
  fn interrupted(&mut self, step: &Step) {
    self.steps_run.push(step.name.clone());
    self.context.append_failures([FailureRecord::new(
      &step.name,
      Some(step.operation.to_string()),
      ErrorKind::Timeout,
      "run cancelled while the step was in flight",
      1,
    )]);
    self.cancelled = true;
  }

  fn not_started(&mut self, step: &Step) {
    self.not_started.push(step.name.clone());
    self.cancelled = true;
  }
}

/// Runs locked definitions.
///
/// Steps run in declaration order. Contiguous steps in the same `parallel`
/// group are dispatched concurrently (bounded by `max_parallel`) and joined
/// before the next stage; their outcomes are applied in declaration order
/// once every member has finished.
pub struct WorkflowEngine {
  executor: StepExecutor,
  dispatcher: Arc<ToolDispatcher>,
  evaluator: Arc<Evaluator>,
  logger: Arc<dyn ExecutionLogger>,
  config: EngineConfig,
}

impl WorkflowEngine {
  pub fn new(
    dispatcher: Arc<ToolDispatcher>,
    heal: Arc<AutoHealController>,
    config: EngineConfig,
  ) -> Self {
    Self::with_logger(dispatcher, heal, config, Arc::new(NoopLogger))
  }

  pub fn with_logger(
    dispatcher: Arc<ToolDispatcher>,
    heal: Arc<AutoHealController>,
    config: EngineConfig,
    logger: Arc<dyn ExecutionLogger>,
  ) -> Self {
    let evaluator = Arc::new(Evaluator::new());
    let executor = StepExecutor::new(
      dispatcher.clone(),
      heal,
      evaluator.clone(),
      logger.clone(),
      config.step_timeout,
    );
    Self {
      executor,
      dispatcher,
      evaluator,
      logger,
      config,
    }
  }

  /// The dispatcher, which also serves as the load-time operation catalog.
  pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
    &self.dispatcher
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Run a definition to completion.
  pub async fn run(&self, definition: &WorkflowDefinition, inputs: Map<String, Value>) -> WorkflowResult {
    self
      .run_with_cancel(definition, inputs, CancellationToken::new())
      .await
  }

  /// Run a definition, stopping early if `cancel` fires or the configured
  /// run timeout elapses.
  #[instrument(
    name = "workflow_run",
    skip_all,
    fields(skill = %definition.name, version = %definition.version)
  )]
  pub async fn run_with_cancel(
    &self,
    definition: &WorkflowDefinition,
    inputs: Map<String, Value>,
    cancel: CancellationToken,
  ) -> WorkflowResult {
    let run_id = uuid::Uuid::new_v4().to_string();
    info!(run_id = %run_id, "workflow_started");
    self.logger.append(
      &run_id,
      RunRecord::RunStarted {
        skill: definition.name.clone(),
        version: definition.version.clone(),
        digest: definition.digest.clone(),
        inputs: Value::Object(inputs.clone()),
      },
    );

    let inputs = match validate_inputs(&definition.inputs, &inputs) {
      Ok(inputs) => inputs,
      Err(e) => {
        warn!(run_id = %run_id, error = %e, "workflow_inputs_rejected");
        let result = WorkflowResult::invalid_inputs(run_id, definition.name.clone(), e);
        self.finish(&result);
        return result;
      }
    };

    // Cancelling the child token ends the timer; dropping the guard
    // cancels it when the run returns.
    let cancel = cancel.child_token();
    let _guard = cancel.clone().drop_guard();
    if let Some(limit) = self.config.run_timeout {
      let timer = cancel.clone();
      tokio::spawn(async move {
        tokio::select! {
          _ = tokio::time::sleep(limit) => timer.cancel(),
          _ = timer.cancelled() => {}
        }
      });
    }

    let mut state = RunState {
      run_id,
      context: ExecutionContext::new(inputs),
      steps_run: Vec::new(),
      steps_skipped: Vec::new(),
      not_started: Vec::new(),
      aborted: None,
      cancelled: false,
    };

    let plan = definition.plan();
    for (index, stage) in plan.stages().iter().enumerate() {
      if cancel.is_cancelled() {
        for step_index in plan.remaining_steps(index) {
          state.not_started(&definition.steps[step_index]);
        }
        break;
      }

      match stage {
        Stage::Sequential(step_index) => {
          self
            .run_sequential(&definition.steps[*step_index], &mut state, &cancel)
            .await;
        }
        Stage::FanOut { group, steps } => {
          info!(group = %group, members = steps.len(), "fan_out_started");
          self
            .run_fan_out(definition, steps, &mut state, &cancel)
            .await;
        }
      }

      if state.aborted.is_some() {
        break;
      }
      if state.cancelled {
        for step_index in plan.remaining_steps(index + 1) {
          state.not_started(&definition.steps[step_index]);
        }
        break;
      }
    }

    let outputs = self.render_outputs(definition, &mut state.context);

    let status = match (state.aborted, state.cancelled) {
      (Some((step, error_kind)), _) => RunStatus::Aborted { step, error_kind },
      (None, true) => RunStatus::Cancelled {
        not_started: state.not_started.clone(),
      },
      (None, false) => RunStatus::Completed,
    };

    for name in &state.not_started {
      self.logger.append(
        &state.run_id,
        RunRecord::StepSkipped {
          step: name.clone(),
          reason: SkipReason::Cancelled,
        },
      );
    }
    let mut steps_skipped = state.steps_skipped;
    steps_skipped.extend(state.not_started);

    let result = WorkflowResult {
      run_id: state.run_id,
      skill: definition.name.clone(),
      status,
      outputs,
      steps_run: state.steps_run,
      steps_skipped,
      failures: state.context.into_failures(),
    };
    self.finish(&result);
    result
  }

  async fn run_sequential(&self, step: &Step, state: &mut RunState, cancel: &CancellationToken) {
    let snapshot = state.context.snapshot();
    let report = tokio::select! {
      report = self.executor.execute(&state.run_id, step, &snapshot) => Some(report),
      _ = cancel.cancelled() => None,
    };
    match report {
      Some(report) => state.apply(step, report),
      None => {
        warn!(run_id = %state.run_id, step = %step.name, "step_cancelled");
        state.interrupted(step);
      }
    }
  }

  async fn run_fan_out(
    &self,
    definition: &WorkflowDefinition,
    members: &[usize],
    state: &mut RunState,
    cancel: &CancellationToken,
  ) {
    let snapshot: Arc<ContextSnapshot> = Arc::new(state.context.snapshot());
    let slots = Arc::new(Semaphore::new(self.config.max_parallel.max(1)));

    let handles: Vec<_> = members
      .iter()
      .map(|&index| {
        let executor = self.executor.clone();
        let step = definition.steps[index].clone();
        let snapshot = snapshot.clone();
        let slots = slots.clone();
        let cancel = cancel.clone();
        let run_id = state.run_id.clone();
        tokio::spawn(async move {
          let _permit = tokio::select! {
            biased; // a slot freed by an interrupted member must not start a dispatch
            _ = cancel.cancelled() => return MemberEnd::NotStarted,
            permit = slots.acquire_owned() => permit,
          };
          tokio::select! {
            biased;
            _ = cancel.cancelled() => MemberEnd::Interrupted,
            report = executor.execute(&run_id, &step, &snapshot) => MemberEnd::Done(report),
          }
        })
      })
      .collect();

    // Barrier: nothing is applied until every member has finished
    let ends = join_all(handles).await;

    for (&index, end) in members.iter().zip(ends) {
      let step = &definition.steps[index];
      match end {
        Ok(MemberEnd::Done(report)) => state.apply(step, report),
        Ok(MemberEnd::Interrupted) => state.interrupted(step),
        Ok(MemberEnd::NotStarted) => state.not_started(step),
        Err(e) => {
          error!(run_id = %state.run_id, step = %step.name, error = %e, "step_task_failed");
          let message = format!("step task failed: {}", e);
          let failure = FailureRecord::new(
            &step.name,
            Some(step.operation.to_string()),
            ErrorKind::InternalFault,
            message.clone(),
            1,
          );
          state.apply(
            step,
            StepReport {
              disposition: StepDisposition::Ran(StepOutcome::failure(ErrorKind::InternalFault, message)),
              failures: vec![failure],
            },
          );
        }
      }
    }
  }

  /// Render skill outputs against the final context. Outputs that fail to
  /// render are omitted and recorded as failures.
  fn render_outputs(
    &self,
    definition: &WorkflowDefinition,
    context: &mut ExecutionContext,
  ) -> BTreeMap<String, String> {
    let scope = context.snapshot().scope;
    let mut outputs = BTreeMap::new();
    for output in &definition.outputs {
      match self.evaluator.render_template(&output.value, &scope) {
        Ok(value) => {
          outputs.insert(output.name.clone(), value);
        }
        Err(e) => {
          warn!(output = %output.name, error = %e, "output_render_failed");
          context.append_failures([FailureRecord::new(
            OUTPUTS_STEP,
            None,
            ErrorKind::InternalFault,
            format!("failed to render output '{}': {}", output.name, e),
            1,
          )]);
        }
      }
    }
    outputs
  }

  fn finish(&self, result: &WorkflowResult) {
    info!(
      run_id = %result.run_id,
      status = result.status.as_str(),
      steps_run = result.steps_run.len(),
      steps_skipped = result.steps_skipped.len(),
      failures = result.failures.len(),
      "workflow_completed"
    );
    self.logger.append(
      &result.run_id,
      RunRecord::RunFinished {
        status: result.status.clone(),
        steps_run: result.steps_run.len(),
        steps_skipped: result.steps_skipped.len(),
        failures: result.failures.len(),
      },
    );
  }
}
