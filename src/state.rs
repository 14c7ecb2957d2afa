use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Explicit result of the dependency install step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { code: Option<i32> },
    TimedOut,
    /// Nothing to install; no process was started.
    Skipped,
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. } | StepOutcome::TimedOut)
    }
}

/// Summary of the last launcher run, written to `.runtime/state.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchRecord {
    pub runtime_version: String,
    pub install: StepOutcome,
    pub script: String,
    pub pid: u32,
    pub launched_at_unix: u64,
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
pub fn read_record(state_path: &Path) -> Result<LaunchRecord> {
    let s = fs::read_to_string(state_path)
        .with_context(|| format!("read {}", state_path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", state_path.display()))
}

pub fn write_record(state_path: &Path, record: &LaunchRecord) -> Result<()> {
    if let Some(parent) = state_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(record).context("serialize launch record")?;
    fs::write(state_path, contents)
        .with_context(|| format!("write {}", state_path.display()))?;
    Ok(())
}
