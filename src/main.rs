//! Bootstrap launcher for the adVideo UI.
//!
//! Checks that Python is available, installs the UI's pip dependencies and
//! starts `adVideo_UI.py` detached, without waiting for it.

mod bootstrap;
mod config;
mod exit_codes;
mod logging;
mod paths;
mod process;
mod state;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::{
    bootstrap::Outcome,
    config::{ConfigFile, InstallFailurePolicy},
};

#[derive(Parser, Debug)]
#[command(
    name = "advideo-launcher",
    version,
    about = "Check for Python, install the adVideo UI dependencies and start the UI"
)]
pub struct Cli {
    /// Config file (default: launcher.toml in the launcher directory).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Interpreter used for the version check and pip.
    #[arg(long)]
    pub python: Option<String>,
    /// Interpreter used to start the UI without a console.
    #[arg(long)]
    pub pythonw: Option<String>,
    /// UI script to start.
    #[arg(long)]
    pub script: Option<PathBuf>,
    /// Install from a requirements file instead of a package list.
    #[arg(long, conflicts_with = "package")]
    pub requirements: Option<PathBuf>,
    /// Package to install; repeat for several. Replaces the configured list.
    #[arg(long = "package", value_name = "NAME")]
    pub package: Vec<String>,
    /// Do not start the UI if the dependency install fails.
    #[arg(long)]
    pub strict_install: bool,
    /// Number of pip attempts before giving up.
    #[arg(long, value_name = "N")]
    pub install_attempts: Option<u32>,
    /// Kill pip after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub install_timeout: Option<u64>,
}

impl Cli {
    /// Flags that were given, in config file shape.
    pub fn overrides(&self) -> ConfigFile {
        ConfigFile {
            python: self.python.clone(),
            pythonw: self.pythonw.clone(),
            script: self.script.clone(),
            packages: (!self.package.is_empty()).then(|| self.package.clone()),
            requirements: self.requirements.clone(),
            install_failure: self.strict_install.then_some(InstallFailurePolicy::Abort),
            install_attempts: self.install_attempts,
            install_timeout_secs: self.install_timeout,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(outcome) => exit_code(&outcome),
        Err(err) => {
            tracing::error!(err = %format!("{err:#}"), "launcher failed");
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<Outcome> {
    let root = paths::root_dir()?;
    logging::init(&root);

    let config_path = cli
        .config
        .as_deref()
        .map(|p| paths::resolve(&root, p))
        .unwrap_or_else(|| paths::config_path(&root));
    let cfg = config::load_config(&config_path, cli.config.is_some(), &root, cli.overrides())?;
    tracing::debug!(?cfg, "configuration loaded");

    let outcome = bootstrap::run(&root, &cfg)?;
    match &outcome {
        Outcome::RuntimeMissing { reason } => {
            eprintln!("error: {}", bootstrap::RUNTIME_MISSING_HINT);
            eprintln!("  ({reason})");
        }
        Outcome::InstallAborted { install } => {
            eprintln!("error: installing dependencies failed ({install:?}); the UI was not started.");
        }
        Outcome::LaunchFailed { reason, .. } => {
            eprintln!("error: could not start {}: {reason}", cfg.script.display());
        }
        Outcome::Launched { .. } => {}
    }
    Ok(outcome)
}

fn exit_code(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Launched { .. } => exit_codes::OK,
        Outcome::RuntimeMissing { .. } => exit_codes::RUNTIME_MISSING,
        Outcome::InstallAborted { .. } => exit_codes::INSTALL_FAILED,
        Outcome::LaunchFailed { .. } => exit_codes::LAUNCH_FAILED,
    }
}
