use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skillflow_dispatch::{ErrorKind, StepOutcome, ToolDispatcher};
use tracing::{info, warn};

use crate::detector::{Detector, default_detectors, first_match};
use crate::policy::{AutoHealPolicy, PolicySet};

const DEFAULT_REMEDIATION_TIMEOUT: Duration = Duration::from_secs(120);

/// What happened when remediation was considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationOutcome {
  NotAttempted,
  Success,
  Failed,
}

/// Result of [`AutoHealController::remediate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
  pub operation: Option<String>,
  pub outcome: RemediationOutcome,
  pub message: Option<String>,
}

impl Remediation {
  fn not_attempted() -> Self {
    Self {
      operation: None,
      outcome: RemediationOutcome::NotAttempted,
      message: None,
    }
  }

  pub fn attempted(&self) -> bool {
    self.outcome != RemediationOutcome::NotAttempted
  }
}

/// Per-step bookkeeping for remediation and retries.
///
/// One ledger lives for one step execution. It bounds remediation to one
/// attempt per failure kind and retries to the policy's `max_retries`.
#[derive(Debug, Default)]
pub struct RetryLedger {
  retries: u32,
  remediated: HashSet<ErrorKind>,
}

impl RetryLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn retries(&self) -> u32 {
    self.retries
  }

  pub fn record_retry(&mut self) {
    self.retries += 1;
  }

  pub fn has_remediated(&self, kind: ErrorKind) -> bool {
    self.remediated.contains(&kind)
  }
}

/// Classifies failures and repairs the environment when a policy allows.
pub struct AutoHealController {
  detectors: Vec<Detector>,
  policies: PolicySet,
  remediation_timeout: Duration,
}

impl AutoHealController {
  pub fn new(policies: PolicySet) -> Self {
    Self {
      detectors: default_detectors(),
      policies,
      remediation_timeout: DEFAULT_REMEDIATION_TIMEOUT,
    }
  }

  pub fn with_remediation_timeout(mut self, timeout: Duration) -> Self {
    self.remediation_timeout = timeout;
    self
  }

  pub fn policies(&self) -> &PolicySet {
    &self.policies
  }

  /// Classify failure text with the built-in table.
  pub fn classify(&self, message: &str) -> ErrorKind {
    first_match(&self.detectors, message).unwrap_or(ErrorKind::Unclassified)
  }

  /// Classify failure text for an operation category. The category's own
  /// detectors are consulted first.
  pub fn classify_for(&self, category: &str, message: &str) -> ErrorKind {
    self
      .policy(category)
      .and_then(|p| first_match(&p.detectors, message))
      .unwrap_or_else(|| self.classify(message))
  }

  pub fn is_remediable(&self, category: &str, kind: ErrorKind) -> bool {
    self
      .policy(category)
      .is_some_and(|p| p.can_remediate(kind))
  }

  /// Run the category's remediation operation for `kind`.
  ///
  /// Does nothing when the kind is not remediable or was already
  /// remediated for this step.
  pub async fn remediate(
    &self,
    category: &str,
    kind: ErrorKind,
    dispatcher: &ToolDispatcher,
    ledger: &mut RetryLedger,
  ) -> Remediation {
    let Some(policy) = self.policy(category).filter(|p| p.can_remediate(kind)) else {
      return Remediation::not_attempted();
    };
    let Some(operation) = policy.remediation_operation.as_deref() else {
      return Remediation::not_attempted();
    };
    if !ledger.remediated.insert(kind) {
      info!(category = %category, kind = %kind, "remediation_skipped_already_attempted");
      return Remediation::not_attempted();
    }

    info!(category = %category, kind = %kind, operation = %operation, "remediation_started");

    let outcome = dispatcher
      .invoke_external(operation, &policy.remediation_args, self.remediation_timeout)
      .await;

    match outcome {
      StepOutcome::Success { .. } => {
        info!(operation = %operation, "remediation_succeeded");
        Remediation {
          operation: Some(operation.to_string()),
          outcome: RemediationOutcome::Success,
          message: None,
        }
      }
      StepOutcome::Failure { kind, message, .. } => {
        warn!(operation = %operation, kind = %kind, error = %message, "remediation_failed");
        Remediation {
          operation: Some(operation.to_string()),
          outcome: RemediationOutcome::Failed,
          message: Some(message),
        }
      }
    }
  }

  /// Whether a step should be dispatched again.
  ///
  /// True only when the kind is remediable for the category, remediation
  /// just succeeded, and the step has retries left.
  pub fn should_retry(
    &self,
    category: &str,
    kind: ErrorKind,
    ledger: &RetryLedger,
    remediation: RemediationOutcome,
  ) -> bool {
    remediation == RemediationOutcome::Success
      && self
        .policy(category)
        .is_some_and(|p| p.can_remediate(kind) && ledger.retries() < p.max_retries)
  }

  fn policy(&self, category: &str) -> Option<&AutoHealPolicy> {
    self.policies.get(category)
  }
}

impl Default for AutoHealController {
  fn default() -> Self {
    Self::new(PolicySet::defaults())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use async_trait::async_trait;
  use skillflow_dispatch::{OperationFailure, OperationHandler};

  use super::*;
  use crate::policy::{CREDENTIAL_DEPENDENT, NETWORK_TUNNEL_DEPENDENT};

  struct Counting {
    calls: Arc<AtomicUsize>,
    succeed: bool,
  }

  #[async_trait]
  impl OperationHandler for Counting {
    async fn invoke(&self, _args: &BTreeMap<String, String>) -> Result<String, OperationFailure> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.succeed {
        Ok("connected".to_string())
      } else {
        Err(OperationFailure::new("vpn daemon not running"))
      }
    }
  }

  fn dispatcher(succeed: bool) -> (ToolDispatcher, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = ToolDispatcher::builder()
      .operation(
        "vpn_connect",
        Arc::new(Counting {
          calls: calls.clone(),
          succeed,
        }),
        "none",
      )
      .build();
    (dispatcher, calls)
  }

  #[test]
  fn test_classify_for_prefers_category_detectors() {
    let policy = AutoHealPolicy {
      detectors: vec![Detector::new("session closed", ErrorKind::NetworkUnreachable).unwrap()],
      ..AutoHealPolicy::remediating(ErrorKind::NetworkUnreachable, "vpn_connect")
    };
    let controller =
      AutoHealController::new(PolicySet::defaults().with(NETWORK_TUNNEL_DEPENDENT, policy));

    assert_eq!(controller.classify("session closed"), ErrorKind::Unclassified);
    assert_eq!(
      controller.classify_for(NETWORK_TUNNEL_DEPENDENT, "session closed"),
      ErrorKind::NetworkUnreachable
    );
    assert_eq!(
      controller.classify_for("unknown-category", "401 Unauthorized"),
      ErrorKind::CredentialExpired
    );
  }

  #[test]
  fn test_is_remediable() {
    let controller = AutoHealController::default();
    assert!(controller.is_remediable(NETWORK_TUNNEL_DEPENDENT, ErrorKind::NetworkUnreachable));
    assert!(controller.is_remediable(CREDENTIAL_DEPENDENT, ErrorKind::CredentialExpired));
    assert!(!controller.is_remediable(NETWORK_TUNNEL_DEPENDENT, ErrorKind::Timeout));
    assert!(!controller.is_remediable("none", ErrorKind::NetworkUnreachable));
  }

  #[tokio::test]
  async fn test_remediates_once_per_kind() {
    let controller = AutoHealController::default();
    let (dispatcher, calls) = dispatcher(true);
    let mut ledger = RetryLedger::new();

    let first = controller
      .remediate(NETWORK_TUNNEL_DEPENDENT, ErrorKind::NetworkUnreachable, &dispatcher, &mut ledger)
      .await;
    assert_eq!(first.outcome, RemediationOutcome::Success);
    assert_eq!(first.operation.as_deref(), Some("vpn_connect"));
    assert!(controller.should_retry(
      NETWORK_TUNNEL_DEPENDENT,
      ErrorKind::NetworkUnreachable,
      &ledger,
      first.outcome
    ));
    ledger.record_retry();

    let second = controller
      .remediate(NETWORK_TUNNEL_DEPENDENT, ErrorKind::NetworkUnreachable, &dispatcher, &mut ledger)
      .await;
    assert_eq!(second.outcome, RemediationOutcome::NotAttempted);
    assert!(!controller.should_retry(
      NETWORK_TUNNEL_DEPENDENT,
      ErrorKind::NetworkUnreachable,
      &ledger,
      second.outcome
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_failed_remediation_is_not_retried() {
    let controller = AutoHealController::default();
    let (dispatcher, _) = dispatcher(false);
    let mut ledger = RetryLedger::new();

    let remediation = controller
      .remediate(NETWORK_TUNNEL_DEPENDENT, ErrorKind::NetworkUnreachable, &dispatcher, &mut ledger)
      .await;
    assert_eq!(remediation.outcome, RemediationOutcome::Failed);
    assert_eq!(remediation.message.as_deref(), Some("vpn daemon not running"));
    assert!(!controller.should_retry(
      NETWORK_TUNNEL_DEPENDENT,
      ErrorKind::NetworkUnreachable,
      &ledger,
      remediation.outcome
    ));
  }

  #[tokio::test]
  async fn test_non_remediable_kind() {
    let controller = AutoHealController::default();
    let (dispatcher, calls) = dispatcher(true);
    let mut ledger = RetryLedger::new();

    let remediation = controller
      .remediate(NETWORK_TUNNEL_DEPENDENT, ErrorKind::ExternalOperationError, &dispatcher, &mut ledger)
      .await;
    assert!(!remediation.attempted());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }
}
