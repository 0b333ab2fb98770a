use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use skillflow_dispatch::{ComputeRegistry, ToolDispatcher};
use skillflow_engine::{
  EngineConfig, ExecutionLogger, JsonlLogger, NoopLogger, SkillRunner, WorkflowEngine,
};
use skillflow_heal::{AutoHealController, PolicySet};
use skillflow_resolver::{DefinitionStore, StandardResolver};
use skillflow_settings::{LogFormat, LoggingSettings, Settings, SettingsLoader};
use skillflow_store::FsSkillStore;

/// Skillflow - run declarative skill workflows against external tools
#[derive(Parser)]
#[command(name = "skillflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to skillflow.toml (default: $SKILLFLOW_CONFIG or ~/.skillflow/skillflow.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Directory holding skill documents, overriding the settings file
  #[arg(long, global = true)]
  skills_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a skill and print its result as JSON
  Run {
    /// Skill name
    skill: String,

    /// Inputs as a JSON object. Read from stdin when omitted.
    #[arg(long)]
    inputs: Option<String>,
  },

  /// Load and validate a skill without running it
  Validate {
    /// Skill name
    skill: String,
  },

  /// List available skills
  List,

  /// Print a skill's validated definition as JSON
  Show {
    /// Skill name
    skill: String,
  },
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let (mut settings, settings_path) =
    SettingsLoader::load(cli.config.as_deref()).context("failed to load settings")?;
  if let Some(dir) = cli.skills_dir {
    settings.engine.skills_dir = dir;
  }
  init_tracing(&settings.logging);
  info!(path = %settings_path.display(), skills_dir = %settings.engine.skills_dir.display(), "settings_loaded");

  let Some(command) = cli.command else {
    println!("skillflow - use --help to see available commands");
    return Ok(ExitCode::SUCCESS);
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Run { skill, inputs } => run_skill(&settings, &skill, inputs).await,
      Commands::Validate { skill } => validate_skill(&settings, &skill).await,
      Commands::List => list_skills(&settings).await,
      Commands::Show { skill } => show_skill(&settings, &skill).await,
    }
  })
}

fn init_tracing(logging: &LoggingSettings) {
  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

  // stdout carries results, so diagnostics go to stderr
  match logging.format {
    LogFormat::Json => tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(io::stderr)
      .json()
      .with_target(true)
      .init(),
    LogFormat::Pretty => tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(io::stderr)
      .with_target(false)
      .init(),
  }
}

fn build_runner(settings: &Settings, logger: Arc<dyn ExecutionLogger>) -> Result<SkillRunner> {
  let dispatcher = Arc::new(
    ToolDispatcher::from_specs(
      &settings.operations,
      ComputeRegistry::with_builtins(),
      settings.session.clone(),
    )
    .context("failed to configure operations")?,
  );
  let policies = PolicySet::from_specs(&settings.auto_heal).context("failed to configure auto-heal")?;

  let store = Arc::new(FsSkillStore::new(&settings.engine.skills_dir));
  let resolver = Arc::new(StandardResolver::new(dispatcher.clone()));
  let definitions = DefinitionStore::new(store, resolver);

  let config = EngineConfig {
    step_timeout: settings.engine.step_timeout(),
    run_timeout: settings.engine.run_timeout(),
    max_parallel: settings.engine.max_parallel,
  };
  let engine = WorkflowEngine::with_logger(
    dispatcher,
    Arc::new(AutoHealController::new(policies)),
    config,
    logger,
  );

  Ok(SkillRunner::new(definitions, engine))
}

async fn run_skill(settings: &Settings, skill: &str, inputs: Option<String>) -> Result<ExitCode> {
  let inputs = match inputs {
    Some(raw) => parse_inputs(&raw)?,
    None => read_inputs_from_stdin()?,
  };

  let (logger, writer) = match &settings.engine.log_dir {
    Some(dir) => {
      let (logger, handle) = JsonlLogger::spawn(dir)
        .await
        .context("failed to start execution log")?;
      let logger: Arc<dyn ExecutionLogger> = Arc::new(logger);
      (logger, Some(handle))
    }
    None => {
      let logger: Arc<dyn ExecutionLogger> = Arc::new(NoopLogger);
      (logger, None)
    }
  };
  let runner = build_runner(settings, logger)?;

  let cancel = CancellationToken::new();
  let interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt_received");
      interrupt.cancel();
    }
  });

  let result = runner.run_with_cancel(skill, inputs, cancel).await;

  // Close the logger so the writer drains and exits
  drop(runner);
  if let Some(handle) = writer
    && let Err(e) = handle.await
  {
    warn!(error = %e, "execution_log_writer_failed");
  }

  println!("{}", serde_json::to_string_pretty(&result)?);

  if result.is_completed() {
    Ok(ExitCode::SUCCESS)
  } else {
    eprintln!("skill '{}' {}", skill, result.status.as_str());
    Ok(ExitCode::FAILURE)
  }
}

async fn validate_skill(settings: &Settings, skill: &str) -> Result<ExitCode> {
  let runner = build_runner(settings, Arc::new(NoopLogger))?;
  match runner.definitions().load(skill).await {
    Ok(definition) => {
      println!(
        "{} {} ok ({} steps, {})",
        definition.name,
        definition.version,
        definition.steps.len(),
        definition.digest
      );
      Ok(ExitCode::SUCCESS)
    }
    Err(e) => {
      eprintln!("{}: {}", skill, e);
      Ok(ExitCode::FAILURE)
    }
  }
}

async fn list_skills(settings: &Settings) -> Result<ExitCode> {
  let runner = build_runner(settings, Arc::new(NoopLogger))?;
  let names = runner
    .definitions()
    .list()
    .await
    .context("failed to list skills")?;
  for name in names {
    println!("{}", name);
  }
  Ok(ExitCode::SUCCESS)
}

async fn show_skill(settings: &Settings, skill: &str) -> Result<ExitCode> {
  let runner = build_runner(settings, Arc::new(NoopLogger))?;
  let definition = runner
    .definitions()
    .load(skill)
    .await
    .with_context(|| format!("failed to load skill '{}'", skill))?;
  println!("{}", serde_json::to_string_pretty(&*definition)?);
  Ok(ExitCode::SUCCESS)
}

fn parse_inputs(raw: &str) -> Result<Map<String, Value>> {
  if raw.trim().is_empty() {
    return Ok(Map::new());
  }
  match serde_json::from_str::<Value>(raw).context("failed to parse inputs JSON")? {
    Value::Object(map) => Ok(map),
    Value::Null => Ok(Map::new()),
    _ => bail!("inputs must be a JSON object"),
  }
}

fn read_inputs_from_stdin() -> Result<Map<String, Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, no inputs
    Ok(Map::new())
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read inputs from stdin")?;
    parse_inputs(&input)
  }
}
