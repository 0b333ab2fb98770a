//! Condition and template evaluation for skill steps.
//!
//! Expressions use a small, closed grammar:
//! - dotted attribute access into inputs and results (`results.get_mr.state`)
//! - `==`, `!=`, `<`, `<=`, `>`, `>=`
//! - `and`, `or`, `not`, and `in` for membership
//! - string, number, boolean and `none` literals
//!
//! Templates are literal text with `{{ expr }}` markers. Filters, tests and
//! function calls are rejected, and evaluation happens in an environment with
//! no registered callables, so input-derived strings can never reach a code
//! execution path.
//!
//! A path that does not resolve evaluates to undefined, which is falsy and
//! renders as an empty string:
//!
//! ```ignore
//! let evaluator = Evaluator::new();
//! let scope = Scope::new(&inputs, &results);
//! // `lint` was skipped, so this is false rather than an error
//! evaluator.eval_condition("lint and lint.passed", &scope)?;
//! ```

mod error;
mod evaluator;
mod grammar;
mod scope;
mod template;

pub use error::ExprError;
pub use evaluator::Evaluator;
pub use grammar::{Reference, scan_references};
pub use scope::Scope;
pub use template::{Segment, segments};
