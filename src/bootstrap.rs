//! The launch sequence: runtime check, dependency install, detached UI start.

use anyhow::Result;
use std::{
    path::Path,
    process::Command,
    time::Duration,
};
use tracing::{error, info, warn};

use crate::{
    config::{Dependencies, InstallFailurePolicy, LauncherConfig},
    paths,
    process::{self, CommandOutput},
    state::{self, LaunchRecord, StepOutcome},
};

pub const RUNTIME_MISSING_HINT: &str =
    "Python was not found. Install Python 3 and make sure it is on PATH, then run the launcher again.";

/// Result of probing the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCheck {
    Available { version: String },
    Missing { reason: String },
}

/// How a launcher run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Launched { pid: u32, install: StepOutcome },
    RuntimeMissing { reason: String },
    InstallAborted { install: StepOutcome },
    LaunchFailed { reason: String, install: StepOutcome },
}

pub fn run(root: &Path, cfg: &LauncherConfig) -> Result<Outcome> {
    run_with_deps(root, cfg, process::run_command, process::spawn_detached)
}

/// Runs the full sequence with injected process executors.
///
/// `exec` runs a command to completion; `spawn` starts one detached and
/// returns its pid.
pub fn run_with_deps(
    root: &Path,
    cfg: &LauncherConfig,
    mut exec: impl FnMut(&mut Command, Option<Duration>) -> Result<CommandOutput>,
    mut spawn: impl FnMut(&mut Command) -> Result<u32>,
) -> Result<Outcome> {
    let version = match check_runtime(cfg, &mut exec) {
        RuntimeCheck::Available { version } => version,
        RuntimeCheck::Missing { reason } => {
            error!(python = %cfg.python, %reason, "python runtime not available");
            return Ok(Outcome::RuntimeMissing { reason });
        }
    };
    info!(python = %cfg.python, %version, "python runtime found");

    let install = install_dependencies(cfg, &mut exec);
    match (&install, cfg.install_failure) {
        (StepOutcome::Succeeded, _) => info!("dependencies installed"),
        (StepOutcome::Skipped, _) => info!("no dependencies to install"),
        (failed, InstallFailurePolicy::Continue) => {
            warn!(outcome = ?failed, "dependency install failed, launching anyway");
        }
        (failed, InstallFailurePolicy::Abort) => {
            error!(outcome = ?failed, "dependency install failed, not launching");
            return Ok(Outcome::InstallAborted {
                install: install.clone(),
            });
        }
    }

    let pid = match launch_ui(cfg, &mut spawn) {
        Ok(pid) => pid,
        Err(err) => {
            let reason = format!("{err:#}");
            error!(script = %cfg.script.display(), %reason, "failed to start UI");
            return Ok(Outcome::LaunchFailed { reason, install });
        }
    };
    info!(script = %cfg.script.display(), pid, "UI started");

    let record = LaunchRecord {
        runtime_version: version,
        install: install.clone(),
        script: cfg.script.to_string_lossy().to_string(),
        pid,
        launched_at_unix: state::now_unix(),
    };
    if let Err(err) = state::write_record(&paths::state_path(root), &record) {
        warn!(err = %format!("{err:#}"), "could not write launch record");
    }

    Ok(Outcome::Launched { pid, install })
}

/// Asks the interpreter for its version. Never retried.
pub fn check_runtime(
    cfg: &LauncherConfig,
    exec: &mut impl FnMut(&mut Command, Option<Duration>) -> Result<CommandOutput>,
) -> RuntimeCheck {
    let mut cmd = Command::new(&cfg.python);
    cmd.arg("--version");
    match exec(&mut cmd, None) {
        Ok(out) if out.success() => RuntimeCheck::Available {
            version: version_line(&out),
        },
        Ok(out) => RuntimeCheck::Missing {
            reason: format!("`{} --version` exited with {:?}", cfg.python, out.code),
        },
        Err(err) => RuntimeCheck::Missing {
            reason: format!("{err:#}"),
        },
    }
}

/// Runs pip for the configured dependencies, retrying up to `install_attempts`.
pub fn install_dependencies(
    cfg: &LauncherConfig,
    exec: &mut impl FnMut(&mut Command, Option<Duration>) -> Result<CommandOutput>,
) -> StepOutcome {
    if let Dependencies::Packages(packages) = &cfg.dependencies {
        if packages.is_empty() {
            return StepOutcome::Skipped;
        }
    }
    let timeout = cfg.install_timeout_secs.map(Duration::from_secs);
    run_with_retry(
        || {
            let mut cmd = pip_install_cmd(cfg);
            match exec(&mut cmd, timeout) {
                Ok(out) => {
                    if !out.success() && !out.stderr.trim().is_empty() {
                        warn!(stderr = %out.stderr.trim(), "pip reported errors");
                    }
                    outcome_of(&out)
                }
                Err(err) => {
                    warn!(err = %format!("{err:#}"), "could not run pip");
                    StepOutcome::Failed { code: None }
                }
            }
        },
        cfg.install_attempts,
        "pip install",
    )
}

/// Starts the UI script detached. The script's existence is not checked.
///
/// The child runs in the script's directory and is handed the bare file
/// name, so the argument stays valid whatever the script path is relative to.
pub fn launch_ui(
    cfg: &LauncherConfig,
    spawn: &mut impl FnMut(&mut Command) -> Result<u32>,
) -> Result<u32> {
    let mut cmd = Command::new(&cfg.pythonw);
    let dir = cfg.script.parent().filter(|d| !d.as_os_str().is_empty());
    match (dir, cfg.script.file_name()) {
        (Some(dir), Some(name)) => {
            cmd.current_dir(dir).arg(name);
        }
        _ => {
            cmd.arg(&cfg.script);
        }
    }
    spawn(&mut cmd)
}

pub fn pip_install_cmd(cfg: &LauncherConfig) -> Command {
    let mut cmd = Command::new(&cfg.python);
    cmd.args(["-m", "pip", "install", "--upgrade", "--quiet"]);
    match &cfg.dependencies {
        Dependencies::Packages(packages) => {
            cmd.args(packages);
        }
        Dependencies::Requirements(path) => {
            cmd.arg("-r").arg(path);
        }
    }
    cmd
}

fn outcome_of(out: &CommandOutput) -> StepOutcome {
    if out.timed_out {
        StepOutcome::TimedOut
    } else if out.success() {
        StepOutcome::Succeeded
    } else {
        StepOutcome::Failed { code: out.code }
    }
}

fn version_line(out: &CommandOutput) -> String {
    [&out.stdout, &out.stderr]
        .iter()
        .flat_map(|s| s.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn run_with_retry(
    mut attempt: impl FnMut() -> StepOutcome,
    attempts: u32,
    label: &str,
) -> StepOutcome {
    let attempts = attempts.max(1);
    let mut delay = Duration::from_millis(250);
    let mut tried = 1;
    loop {
        let outcome = attempt();
        if !outcome.is_failure() {
            return outcome;
        }
        if tried == attempts {
            if attempts > 1 {
                warn!("{label} failed after {attempts} attempts");
            }
            return outcome;
        }
        warn!(outcome = ?outcome, "{label} failed, retrying...");
        std::thread::sleep(delay);
        delay = std::cmp::min(delay * 2, Duration::from_secs(5));
        tried += 1;
    }
}
