use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::command::CommandHandler;
use crate::dispatcher::NO_CATEGORY;
use crate::error::DispatchError;
use crate::handler::OperationHandler;
use crate::http::{HttpHandler, parse_method};

/// Configuration of one external operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
  #[serde(flatten)]
  pub handler: HandlerSpec,
  /// Auto-heal policy category, e.g. `network-tunnel-dependent`.
  #[serde(default = "default_category")]
  pub category: String,
}

/// How an operation is carried out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerSpec {
  Command {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    working_dir: Option<PathBuf>,
  },
  Http {
    #[serde(default = "default_method")]
    method: String,
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
  },
}

fn default_category() -> String {
  NO_CATEGORY.to_string()
}

fn default_method() -> String {
  "GET".to_string()
}

impl OperationSpec {
  /// Build the handler this spec describes.
  pub fn build(
    &self,
    name: &str,
    client: &Client,
  ) -> Result<Arc<dyn OperationHandler>, DispatchError> {
    match &self.handler {
      HandlerSpec::Command {
        program,
        args,
        env,
        working_dir,
      } => {
        if program.trim().is_empty() {
          return Err(DispatchError::EmptyProgram {
            operation: name.to_string(),
          });
        }
        Ok(Arc::new(
          CommandHandler::new(program)
            .args(args.iter().cloned())
            .env(env.clone())
            .working_dir(working_dir.clone()),
        ))
      }
      HandlerSpec::Http {
        method,
        url,
        headers,
      } => {
        let method = parse_method(method).ok_or_else(|| DispatchError::InvalidMethod {
          operation: name.to_string(),
          method: method.clone(),
        })?;
        Ok(Arc::new(
          HttpHandler::new(client.clone(), method, url).headers(headers.clone()),
        ))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deserialize_command() {
    let spec: OperationSpec = serde_json::from_value(serde_json::json!({
      "kind": "command",
      "program": "glab",
      "args": ["mr", "view", "{iid}"],
      "category": "credential-dependent",
    }))
    .unwrap();
    assert_eq!(spec.category, "credential-dependent");
    assert!(matches!(spec.handler, HandlerSpec::Command { ref program, .. } if program == "glab"));
  }

  #[test]
  fn test_deserialize_http_defaults() {
    let spec: OperationSpec = serde_json::from_value(serde_json::json!({
      "kind": "http",
      "url": "https://ci.example.com/api/pipelines/{id}",
    }))
    .unwrap();
    assert_eq!(spec.category, NO_CATEGORY);
    assert!(matches!(spec.handler, HandlerSpec::Http { ref method, .. } if method == "GET"));
  }

  #[test]
  fn test_build_rejects_bad_method() {
    let spec = OperationSpec {
      handler: HandlerSpec::Http {
        method: "TRACE".to_string(),
        url: "http://localhost".to_string(),
        headers: BTreeMap::new(),
      },
      category: NO_CATEGORY.to_string(),
    };
    assert!(matches!(
      spec.build("probe", &Client::new()),
      Err(DispatchError::InvalidMethod { .. })
    ));
  }
}
