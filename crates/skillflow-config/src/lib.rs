//! Skillflow Config
//!
//! This crate contains the serializable skill document types for skillflow.
//! These types represent skill definitions as written by authors, before they
//! are validated and locked by the resolver.
//!
//! Documents can be loaded from:
//! - YAML files (`.yaml` / `.yml`)
//! - JSON files (`.json`)
//!
//! The resolver takes these types, checks every reference and operation name,
//! and produces an immutable `WorkflowDefinition` for the engine.

mod arg;
mod enums;
mod error;
mod parse;
mod skill;
mod step;

pub use arg::ArgValue;
pub use enums::{InputType, OnError};
pub use error::ParseError;
pub use parse::DocumentFormat;
pub use skill::{InputDef, OutputDef, SkillDef};
pub use step::{COMPUTE_TOOL, StepDef};
