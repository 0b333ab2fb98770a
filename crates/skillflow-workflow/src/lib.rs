//! Skillflow Workflow
//!
//! This crate provides the "locked" skill representation for skillflow.
//! A locked definition is the validated form of a skill document that is
//! ready for execution.
//!
//! Key differences from `skillflow-config`:
//! - Every step references only inputs or outputs of earlier steps
//! - Output names are unique and operation names are known
//! - Fan-out groups are contiguous and internally independent
//! - The execution plan (sequential stages and fan-out groups) is derived
//!   from declaration order

mod catalog;
mod definition;
mod error;
mod plan;
mod step;

pub use catalog::OperationCatalog;
pub use definition::{RESERVED_NAMES, WorkflowDefinition};
pub use error::DefinitionError;
pub use plan::{ExecutionPlan, Stage};
pub use step::{Operation, Step};

pub use skillflow_config::{ArgValue, InputDef, InputType, OnError, OutputDef};
