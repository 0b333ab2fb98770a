//! Definition Store for skillflow.
//!
//! Turns skill documents into validated, immutable `WorkflowDefinition`s.
//! All reference and operation checks happen here, so a definition that
//! loads can never fail at run time for structural reasons.

mod digest;
mod resolver;
mod store;

pub use digest::content_digest;
pub use resolver::{Resolver, StandardResolver};
pub use store::DefinitionStore;
