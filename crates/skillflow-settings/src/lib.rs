//! Application settings for skillflow.
//!
//! Settings come from `skillflow.toml`, located by explicit path, then the
//! `SKILLFLOW_CONFIG` environment variable, then `~/.skillflow/`. A missing
//! file yields defaults. A few fields can be overridden from the
//! environment.

mod error;
mod loader;
mod settings;

pub use error::SettingsError;
pub use loader::{CONFIG_ENV, SettingsLoader};
pub use settings::{EngineSettings, LogFormat, LoggingSettings, Settings};
