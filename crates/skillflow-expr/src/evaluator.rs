use std::collections::BTreeMap;

use minijinja::value::ValueKind;
use minijinja::{Environment, UndefinedBehavior, Value};
use skillflow_config::ArgValue;

use crate::error::ExprError;
use crate::grammar::{Reference, scan_references};
use crate::scope::Scope;
use crate::template::{Segment, segments};

/// Evaluates conditions and renders templates against a [`Scope`].
///
/// The underlying environment is empty: no filters, tests, functions or
/// globals are registered.
pub struct Evaluator {
  env: Environment<'static>,
}

impl Evaluator {
  pub fn new() -> Self {
    let mut env = Environment::empty();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    Self { env }
  }

  /// Check that an expression is in the grammar and compiles, returning
  /// the paths it reads.
  pub fn check_expression(&self, expr: &str) -> Result<Vec<Reference>, ExprError> {
    let references = scan_references(expr)?;
    self.env.compile_expression(expr).map_err(|e| ExprError::Syntax {
      expr: expr.to_string(),
      message: e.to_string(),
    })?;
    Ok(references)
  }

  /// Check every marker of a template, returning the paths it reads.
  pub fn check_template(&self, template: &str) -> Result<Vec<Reference>, ExprError> {
    let mut references: Vec<Reference> = Vec::new();
    for segment in segments(template)? {
      if let Segment::Expr(expr) = segment {
        for reference in self.check_expression(expr)? {
          if !references.contains(&reference) {
            references.push(reference);
          }
        }
      }
    }
    Ok(references)
  }

  /// Evaluate a condition to a boolean using truthiness.
  ///
  /// Undefined paths, `none`, `false`, zero and empty collections are
  /// false.
  pub fn eval_condition(&self, expr: &str, scope: &Scope) -> Result<bool, ExprError> {
    Ok(self.eval(expr, scope)?.is_true())
  }

  /// Render a template to a string.
  ///
  /// Undefined and `none` render as an empty string; maps and sequences
  /// render as compact JSON.
  pub fn render_template(&self, template: &str, scope: &Scope) -> Result<String, ExprError> {
    let mut out = String::with_capacity(template.len());
    for segment in segments(template)? {
      match segment {
        Segment::Literal(text) => out.push_str(text),
        Segment::Expr(expr) => {
          let value = self.eval(expr, scope)?;
          out.push_str(&stringify(expr, &value)?);
        }
      }
    }
    Ok(out)
  }

  /// Render one argument value. Literals pass through untouched.
  pub fn render_arg(&self, arg: &ArgValue, scope: &Scope) -> Result<String, ExprError> {
    match arg {
      ArgValue::Literal(text) => Ok(text.clone()),
      ArgValue::Template(template) => self.render_template(template, scope),
    }
  }

  /// Render every argument of a step, failing on the first error.
  pub fn render_args(
    &self,
    args: &BTreeMap<String, ArgValue>,
    scope: &Scope,
  ) -> Result<BTreeMap<String, String>, ExprError> {
    let mut rendered = BTreeMap::new();
    for (name, arg) in args {
      let value = self.render_arg(arg, scope).map_err(|e| ExprError::Arg {
        name: name.clone(),
        source: Box::new(e),
      })?;
      rendered.insert(name.clone(), value);
    }
    Ok(rendered)
  }

  fn eval(&self, expr: &str, scope: &Scope) -> Result<Value, ExprError> {
    scan_references(expr)?;
    let compiled = self.env.compile_expression(expr).map_err(|e| ExprError::Syntax {
      expr: expr.to_string(),
      message: e.to_string(),
    })?;
    compiled.eval(scope.value()).map_err(|e| ExprError::Eval {
      expr: expr.to_string(),
      message: e.to_string(),
    })
  }
}

impl Default for Evaluator {
  fn default() -> Self {
    Self::new()
  }
}

fn stringify(expr: &str, value: &Value) -> Result<String, ExprError> {
  if value.is_undefined() || value.is_none() {
    return Ok(String::new());
  }
  match value.kind() {
    ValueKind::Map | ValueKind::Seq => serde_json::to_string(value).map_err(|e| ExprError::Eval {
      expr: expr.to_string(),
      message: e.to_string(),
    }),
    _ => Ok(value.to_string()),
  }
}
