use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use skillflow_dispatch::{ErrorKind, NO_CATEGORY};

use crate::detector::{Detector, DetectorSpec};
use crate::error::HealError;

/// Operations that need a tunnel to reach their environment.
pub const NETWORK_TUNNEL_DEPENDENT: &str = "network-tunnel-dependent";

/// Operations that authenticate with a refreshable credential.
pub const CREDENTIAL_DEPENDENT: &str = "credential-dependent";

/// Policy as written in configuration under `[auto_heal.<category>]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
  #[serde(default)]
  pub detectors: Vec<DetectorSpec>,
  #[serde(default)]
  pub remediation_operation: Option<String>,
  #[serde(default)]
  pub remediation_args: BTreeMap<String, String>,
  #[serde(default)]
  pub remediable: Vec<ErrorKind>,
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
}

fn default_max_retries() -> u32 {
  1
}

/// How failures of one operation category are classified and repaired.
#[derive(Debug, Clone)]
pub struct AutoHealPolicy {
  /// Category-specific detectors, consulted before the built-in table.
  pub detectors: Vec<Detector>,
  pub remediation_operation: Option<String>,
  pub remediation_args: BTreeMap<String, String>,
  /// Kinds the remediation operation repairs.
  pub remediable: Vec<ErrorKind>,
  /// Retries allowed per step after a successful remediation.
  pub max_retries: u32,
}

impl AutoHealPolicy {
  /// A policy that never remediates.
  pub fn none() -> Self {
    Self {
      detectors: Vec::new(),
      remediation_operation: None,
      remediation_args: BTreeMap::new(),
      remediable: Vec::new(),
      max_retries: 0,
    }
  }

  /// A policy repairing one kind with one operation, retrying once.
  pub fn remediating(kind: ErrorKind, operation: impl Into<String>) -> Self {
    Self {
      detectors: Vec::new(),
      remediation_operation: Some(operation.into()),
      remediation_args: BTreeMap::new(),
      remediable: vec![kind],
      max_retries: default_max_retries(),
    }
  }

  pub fn from_spec(category: &str, spec: &PolicySpec) -> Result<Self, HealError> {
    if spec.remediation_operation.is_none() && !spec.remediable.is_empty() {
      return Err(HealError::MissingRemediation {
        category: category.to_string(),
      });
    }
    let detectors = spec
      .detectors
      .iter()
      .map(Detector::from_spec)
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self {
      detectors,
      remediation_operation: spec.remediation_operation.clone(),
      remediation_args: spec.remediation_args.clone(),
      remediable: spec.remediable.clone(),
      max_retries: spec.max_retries,
    })
  }

  pub fn can_remediate(&self, kind: ErrorKind) -> bool {
    self.remediation_operation.is_some() && self.remediable.contains(&kind)
  }
}

/// Policies keyed by operation category.
#[derive(Debug, Clone)]
pub struct PolicySet {
  policies: HashMap<String, AutoHealPolicy>,
}

impl PolicySet {
  pub fn empty() -> Self {
    Self {
      policies: HashMap::new(),
    }
  }

  /// Built-in policies: reconnect the tunnel for network-dependent
  /// operations, re-authenticate for credential-dependent ones.
  pub fn defaults() -> Self {
    Self::empty()
      .with(
        NETWORK_TUNNEL_DEPENDENT,
        AutoHealPolicy::remediating(ErrorKind::NetworkUnreachable, "vpn_connect"),
      )
      .with(
        CREDENTIAL_DEPENDENT,
        AutoHealPolicy::remediating(ErrorKind::CredentialExpired, "kube_login"),
      )
      .with(NO_CATEGORY, AutoHealPolicy::none())
  }

  /// Built-in policies with configured ones layered on top.
  pub fn from_specs(specs: &BTreeMap<String, PolicySpec>) -> Result<Self, HealError> {
    let mut set = Self::defaults();
    for (category, spec) in specs {
      set
        .policies
        .insert(category.clone(), AutoHealPolicy::from_spec(category, spec)?);
    }
    Ok(set)
  }

  /// Register a policy. Adding self-healing to a category is one call.
  pub fn with(mut self, category: impl Into<String>, policy: AutoHealPolicy) -> Self {
    self.policies.insert(category.into(), policy);
    self
  }

  pub fn get(&self, category: &str) -> Option<&AutoHealPolicy> {
    self.policies.get(category)
  }

  /// Every operation some policy may call, sorted and deduplicated.
  pub fn remediation_operations(&self) -> Vec<&str> {
    let mut ops: Vec<&str> = self
      .policies
      .values()
      .filter_map(|p| p.remediation_operation.as_deref())
      .collect();
    ops.sort_unstable();
    ops.dedup();
    ops
  }
}

impl Default for PolicySet {
  fn default() -> Self {
    Self::defaults()
  }
}
