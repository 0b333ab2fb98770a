use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::outcome::ErrorKind;

/// A failed operation call, as reported by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
  pub message: String,
  pub raw: Option<String>,
  /// Kind the handler already knows, e.g. from an HTTP status. When absent
  /// the failure text is classified by the auto-heal detectors.
  pub kind: Option<ErrorKind>,
}

impl OperationFailure {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      raw: None,
      kind: None,
    }
  }

  pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
    self.raw = Some(raw.into());
    self
  }

  pub fn with_kind(mut self, kind: ErrorKind) -> Self {
    self.kind = Some(kind);
    self
  }
}

/// An external operation the dispatcher can call by name.
///
/// Handlers receive fully rendered string arguments and return the raw
/// output on success. They hold no per-run state, so one handler may serve
/// concurrent calls.
#[async_trait]
pub trait OperationHandler: Send + Sync {
  async fn invoke(&self, args: &BTreeMap<String, String>) -> Result<String, OperationFailure>;
}

/// Replace `{name}` placeholders with argument values.
///
/// Placeholders without a matching argument are left untouched.
pub(crate) fn substitute(template: &str, args: &BTreeMap<String, String>) -> String {
  let mut out = String::with_capacity(template.len());
  let mut rest = template;

  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    match after.find('}') {
      Some(close) if args.contains_key(&after[..close]) => {
        out.push_str(&args[&after[..close]]);
        rest = &after[close + 1..];
      }
      _ => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Names of the `{name}` placeholders a template uses.
pub(crate) fn placeholders(template: &str) -> Vec<&str> {
  let mut names = Vec::new();
  let mut rest = template;
  while let Some(open) = rest.find('{') {
    let after = &rest[open + 1..];
    let Some(close) = after.find('}') else {
      break;
    };
    let name = &after[..close];
    if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
      names.push(name);
    }
    rest = &after[close + 1..];
  }
  names
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args() -> BTreeMap<String, String> {
    BTreeMap::from([
      ("project".to_string(), "infra".to_string()),
      ("iid".to_string(), "42".to_string()),
    ])
  }

  #[test]
  fn test_substitute() {
    assert_eq!(
      substitute("/projects/{project}/mrs/{iid}", &args()),
      "/projects/infra/mrs/42"
    );
    assert_eq!(substitute("{unknown} {iid}", &args()), "{unknown} 42");
    assert_eq!(substitute("a { b", &args()), "a { b");
  }

  #[test]
  fn test_placeholders() {
    assert_eq!(placeholders("/p/{project}/m/{iid}?x={}"), vec!["project", "iid"]);
  }
}
