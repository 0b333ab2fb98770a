//! Auto-heal for skillflow.
//!
//! Failures are classified by an ordered table of regex detectors. Kinds
//! that a category's policy can repair (a dropped tunnel, an expired
//! credential) trigger one named remediation operation through the
//! dispatcher, after which the step may be retried once. Everything else
//! is surfaced to the step's `on_error` policy.

mod controller;
mod detector;
mod error;
mod policy;

pub use controller::{AutoHealController, Remediation, RemediationOutcome, RetryLedger};
pub use detector::{Detector, DetectorSpec, default_detectors};
pub use error::HealError;
pub use policy::{
  AutoHealPolicy, CREDENTIAL_DEPENDENT, NETWORK_TUNNEL_DEPENDENT, PolicySet, PolicySpec,
};
