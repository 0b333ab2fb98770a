use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};
use skillflow_workflow::{Operation, OperationCatalog};
use tracing::{debug, instrument};

use crate::compute::{ComputeInput, ComputeRegistry};
use crate::error::DispatchError;
use crate::handler::OperationHandler;
use crate::outcome::{ErrorKind, StepOutcome, parse_output};
use crate::session::Session;
use crate::spec::OperationSpec;

/// Category of operations with no auto-heal policy.
pub const NO_CATEGORY: &str = "none";

struct RegisteredOperation {
  handler: Arc<dyn OperationHandler>,
  category: String,
}

/// One call through the dispatcher.
pub struct DispatchRequest<'a> {
  pub args: &'a BTreeMap<String, String>,
  pub inputs: &'a Map<String, Value>,
  pub results: &'a Map<String, Value>,
  pub timeout: Duration,
}

/// Uniform call boundary for every operation a step can name.
///
/// The set of operations is fixed at construction. The dispatcher holds no
/// per-call state, so it is shared freely between concurrent steps.
pub struct ToolDispatcher {
  operations: HashMap<String, RegisteredOperation>,
  compute: ComputeRegistry,
  session: Session,
}

impl ToolDispatcher {
  pub fn builder() -> ToolDispatcherBuilder {
    ToolDispatcherBuilder::default()
  }

  /// Build a dispatcher from configured operation specs.
  pub fn from_specs(
    specs: &BTreeMap<String, OperationSpec>,
    compute: ComputeRegistry,
    session: Session,
  ) -> Result<Self, DispatchError> {
    let client = Client::builder().build()?;
    let mut builder = Self::builder().compute(compute).session(session);
    for (name, spec) in specs {
      let handler = spec.build(name, &client)?;
      builder = builder.operation(name, handler, &spec.category);
    }
    Ok(builder.build())
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  /// Auto-heal category of an external operation.
  pub fn category_of(&self, operation: &str) -> &str {
    self
      .operations
      .get(operation)
      .map_or(NO_CATEGORY, |op| op.category.as_str())
  }

  /// Registered external operations visible to the session, sorted.
  pub fn operation_names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self
      .operations
      .keys()
      .map(String::as_str)
      .filter(|name| self.session.allows(name))
      .collect();
    names.sort_unstable();
    names
  }

  pub fn compute_names(&self) -> Vec<&str> {
    self.compute.names()
  }

  /// Dispatch a step's operation.
  #[instrument(name = "dispatch", skip(self, operation, request), fields(operation = %operation))]
  pub async fn invoke(&self, operation: &Operation, request: &DispatchRequest<'_>) -> StepOutcome {
    match operation {
      Operation::Compute(name) => self.compute.call(
        name,
        &ComputeInput {
          inputs: request.inputs,
          results: request.results,
          args: request.args,
        },
      ),
      Operation::External(name) => self.invoke_external(name, request.args, request.timeout).await,
    }
  }

  /// Call an external operation by name with a deadline.
  pub async fn invoke_external(
    &self,
    name: &str,
    args: &BTreeMap<String, String>,
    timeout: Duration,
  ) -> StepOutcome {
    let Some(operation) = self.operations.get(name).filter(|_| self.session.allows(name)) else {
      return StepOutcome::failure(
        ErrorKind::DefinitionError,
        format!("unknown operation '{}'", name),
      );
    };

    debug!(operation = %name, timeout_ms = timeout.as_millis() as u64, "operation_invoked");

    match tokio::time::timeout(timeout, operation.handler.invoke(args)).await {
      Ok(Ok(raw)) => StepOutcome::success(parse_output(&raw)),
      Ok(Err(failure)) => StepOutcome::Failure {
        kind: failure.kind.unwrap_or(ErrorKind::Unclassified),
        message: failure.message,
        raw: failure.raw,
      },
      Err(_) => StepOutcome::failure(
        ErrorKind::Timeout,
        format!("operation '{}' timed out after {}ms", name, timeout.as_millis()),
      ),
    }
  }
}

impl OperationCatalog for ToolDispatcher {
  fn has_operation(&self, name: &str) -> bool {
    self.operations.contains_key(name) && self.session.allows(name)
  }

  fn has_compute(&self, name: &str) -> bool {
    self.compute.contains(name)
  }
}

/// Builder for [`ToolDispatcher`].
#[derive(Default)]
pub struct ToolDispatcherBuilder {
  operations: HashMap<String, RegisteredOperation>,
  compute: ComputeRegistry,
  session: Session,
}

impl ToolDispatcherBuilder {
  pub fn operation(
    mut self,
    name: impl Into<String>,
    handler: Arc<dyn OperationHandler>,
    category: impl Into<String>,
  ) -> Self {
    self.operations.insert(
      name.into(),
      RegisteredOperation {
        handler,
        category: category.into(),
      },
    );
    self
  }

  pub fn compute(mut self, compute: ComputeRegistry) -> Self {
    self.compute = compute;
    self
  }

  pub fn session(mut self, session: Session) -> Self {
    self.session = session;
    self
  }

  pub fn build(self) -> ToolDispatcher {
    ToolDispatcher {
      operations: self.operations,
      compute: self.compute,
      session: self.session,
    }
  }
}
