use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use skillflow_dispatch::ErrorKind;

use crate::error::HealError;

/// Detector as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorSpec {
  pub pattern: String,
  pub kind: ErrorKind,
}

/// A case-insensitive pattern mapping failure text to a kind.
#[derive(Debug, Clone)]
pub struct Detector {
  regex: Regex,
  kind: ErrorKind,
}

impl Detector {
  pub fn new(pattern: &str, kind: ErrorKind) -> Result<Self, HealError> {
    let regex = RegexBuilder::new(pattern)
      .case_insensitive(true)
      .build()
      .map_err(|source| HealError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
      })?;
    Ok(Self { regex, kind })
  }

  pub fn from_spec(spec: &DetectorSpec) -> Result<Self, HealError> {
    Self::new(&spec.pattern, spec.kind)
  }

  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  pub fn matches(&self, text: &str) -> bool {
    self.regex.is_match(text)
  }
}

/// Built-in detectors, in match order.
const DEFAULT_TABLE: &[(&str, ErrorKind)] = &[
  (r"no route to host", ErrorKind::NetworkUnreachable),
  (r"network is unreachable", ErrorKind::NetworkUnreachable),
  (r"connection refused", ErrorKind::NetworkUnreachable),
  (r"connection timed out", ErrorKind::NetworkUnreachable),
  (r"could not resolve host", ErrorKind::NetworkUnreachable),
  (r"name or service not known", ErrorKind::NetworkUnreachable),
  (r"temporary failure in name resolution", ErrorKind::NetworkUnreachable),
  (r"dial tcp", ErrorKind::NetworkUnreachable),
  (r"i/o timeout", ErrorKind::NetworkUnreachable),
  (r"error sending request", ErrorKind::NetworkUnreachable),
  (r"\bunauthorized\b", ErrorKind::CredentialExpired),
  (r"\b401\b", ErrorKind::CredentialExpired),
  (r"\b403\b", ErrorKind::CredentialExpired),
  (r"\bforbidden\b", ErrorKind::CredentialExpired),
  (r"token (has )?expired|token is expired", ErrorKind::CredentialExpired),
  (r"authentication (failed|required)", ErrorKind::CredentialExpired),
  (r"provide credentials", ErrorKind::CredentialExpired),
  (r"invalid credentials", ErrorKind::CredentialExpired),
  (r"login required", ErrorKind::CredentialExpired),
  (r"merge conflict|\bconflict\b", ErrorKind::ExternalOperationError),
  (r"not found|\b404\b", ErrorKind::ExternalOperationError),
  (r"already exists", ErrorKind::ExternalOperationError),
  (r"bad request|\b400\b|\b422\b", ErrorKind::ExternalOperationError),
  (r"validation failed", ErrorKind::ExternalOperationError),
];

/// The built-in detector table.
pub fn default_detectors() -> Vec<Detector> {
  DEFAULT_TABLE
    .iter()
    .filter_map(|(pattern, kind)| Detector::new(pattern, *kind).ok())
    .collect()
}

/// Kind of the first detector matching `text`.
pub(crate) fn first_match(detectors: &[Detector], text: &str) -> Option<ErrorKind> {
  detectors.iter().find(|d| d.matches(text)).map(Detector::kind)
}
