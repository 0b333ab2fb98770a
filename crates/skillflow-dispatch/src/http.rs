use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};

use crate::handler::{OperationFailure, OperationHandler, placeholders, substitute};
use crate::outcome::ErrorKind;

/// Longest response body quoted in a failure message.
const MAX_MESSAGE_BODY: usize = 512;

/// Calls an HTTP endpoint.
///
/// `{name}` placeholders in the URL and header values are filled from the
/// step's arguments. Arguments not consumed by the URL are sent as a query
/// string for GET, HEAD and DELETE, and as a JSON object body otherwise.
#[derive(Debug, Clone)]
pub struct HttpHandler {
  client: Client,
  method: Method,
  url: String,
  headers: BTreeMap<String, String>,
}

impl HttpHandler {
  pub fn new(client: Client, method: Method, url: impl Into<String>) -> Self {
    Self {
      client,
      method,
      url: url.into(),
      headers: BTreeMap::new(),
    }
  }

  pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
    self.headers = headers;
    self
  }

  fn sends_query(&self) -> bool {
    matches!(self.method, Method::GET | Method::HEAD | Method::DELETE)
  }
}

pub(crate) fn parse_method(method: &str) -> Option<Method> {
  match method.to_uppercase().as_str() {
    "GET" => Some(Method::GET),
    "POST" => Some(Method::POST),
    "PUT" => Some(Method::PUT),
    "DELETE" => Some(Method::DELETE),
    "PATCH" => Some(Method::PATCH),
    "HEAD" => Some(Method::HEAD),
    _ => None,
  }
}

/// Kind implied by an HTTP error status, if any.
fn status_kind(status: StatusCode) -> Option<ErrorKind> {
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(ErrorKind::CredentialExpired),
    StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => None,
    s if s.is_client_error() => Some(ErrorKind::ExternalOperationError),
    _ => None,
  }
}

fn truncate(body: &str) -> &str {
  match body.char_indices().nth(MAX_MESSAGE_BODY) {
    Some((index, _)) => &body[..index],
    None => body,
  }
}

#[async_trait]
impl OperationHandler for HttpHandler {
  async fn invoke(&self, args: &BTreeMap<String, String>) -> Result<String, OperationFailure> {
    let url = substitute(&self.url, args);
    let consumed = placeholders(&self.url);
    let rest: BTreeMap<&str, &str> = args
      .iter()
      .filter(|(k, _)| !consumed.contains(&k.as_str()))
      .map(|(k, v)| (k.as_str(), v.as_str()))
      .collect();

    let mut request = self.client.request(self.method.clone(), &url);
    for (key, value) in &self.headers {
      request = request.header(key, substitute(value, args));
    }
    if self.sends_query() {
      if !rest.is_empty() {
        request = request.query(&rest);
      }
    } else {
      request = request.json(&rest);
    }

    let response = request.send().await.map_err(|e| {
      let failure = OperationFailure::new(format!("{} {}: {}", self.method, url, e));
      if e.is_connect() {
        failure.with_kind(ErrorKind::NetworkUnreachable)
      } else if e.is_timeout() {
        failure.with_kind(ErrorKind::Timeout)
      } else {
        failure
      }
    })?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| OperationFailure::new(format!("failed to read response body: {}", e)))?;

    if status.is_success() {
      return Ok(body);
    }

    let mut failure = OperationFailure::new(format!("HTTP {}: {}", status, truncate(body.trim())))
      .with_raw(body);
    if let Some(kind) = status_kind(status) {
      failure = failure.with_kind(kind);
    }
    Err(failure)
  }
}
