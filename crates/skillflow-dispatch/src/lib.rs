//! Tool dispatch for skillflow.
//!
//! The dispatcher is the single call boundary between the engine and every
//! operation a step can name: CLI wrappers, HTTP endpoints and inline
//! compute functions. Operations are registered once at construction and
//! looked up by name; every call returns a `StepOutcome` value rather than
//! an error.

mod command;
mod compute;
mod dispatcher;
mod error;
mod handler;
mod http;
mod outcome;
mod session;
mod spec;

pub use command::CommandHandler;
pub use compute::{ComputeFn, ComputeInput, ComputeRegistry};
pub use dispatcher::{DispatchRequest, NO_CATEGORY, ToolDispatcher, ToolDispatcherBuilder};
pub use error::DispatchError;
pub use handler::{OperationFailure, OperationHandler};
pub use http::HttpHandler;
pub use outcome::{ErrorKind, StepOutcome, parse_output};
pub use session::Session;
pub use spec::{HandlerSpec, OperationSpec};
