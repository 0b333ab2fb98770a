use thiserror::Error;

/// Errors raised while checking or evaluating expressions and templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
  /// The expression does not parse.
  #[error("invalid expression '{expr}': {message}")]
  Syntax { expr: String, message: String },

  /// The expression uses a construct outside the supported grammar.
  #[error("{construct} are not supported in expressions: '{expr}'")]
  Unsupported {
    expr: String,
    construct: &'static str,
  },

  /// A `{{` marker without a matching `}}`.
  #[error("unterminated '{{{{' marker in template '{template}'")]
  UnterminatedMarker { template: String },

  /// A `{{ }}` marker with nothing inside.
  #[error("empty '{{{{ }}}}' marker in template '{template}'")]
  EmptyMarker { template: String },

  /// Evaluation failed at run time.
  #[error("failed to evaluate '{expr}': {message}")]
  Eval { expr: String, message: String },

  /// Rendering a named step argument failed.
  #[error("failed to render argument '{name}': {source}")]
  Arg {
    name: String,
    #[source]
    source: Box<ExprError>,
  },
}
