//! Skill execution for skillflow.
//!
//! The `WorkflowEngine` runs a locked `WorkflowDefinition` stage by stage,
//! handing each step to the `StepExecutor`, which evaluates the step's
//! condition, renders its arguments, dispatches it and applies auto-heal on
//! failure. Every run produces a `WorkflowResult` value; nothing escapes as
//! an error.
//!
//! `SkillRunner` ties the engine to the definition store and provides the
//! JSON-in, JSON-out `skill_run` entry point.

mod context;
mod engine;
mod error;
mod events;
mod executor;
mod inputs;
mod result;
mod runner;

pub use context::{ContextSnapshot, ExecutionContext, FailureRecord};
pub use engine::{EngineConfig, WorkflowEngine};
pub use error::EngineError;
pub use events::{ChannelLogger, ExecutionLogger, JsonlLogger, LogEntry, NoopLogger, RunRecord, SkipReason};
pub use executor::{StepDisposition, StepExecutor, StepReport};
pub use inputs::validate_inputs;
pub use result::{RunStatus, WorkflowResult};
pub use runner::SkillRunner;
