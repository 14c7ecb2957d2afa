//! Tracing setup.
//!
//! Events go to stderr (compact) and are appended to
//! `.runtime/logs/launcher.log`, since the UI is started without a console
//! and the log file is the only trace a user can send back.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::paths;

const LOG_FILE_NAME: &str = "launcher.log";

/// Opens (creating if needed) the launcher log file in append mode.
pub fn open_log_file(root: &Path) -> Result<(PathBuf, fs::File)> {
    let dir = paths::logs_dir(root);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let log_path = dir.join(LOG_FILE_NAME);
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open {}", log_path.display()))?;
    Ok((log_path, file))
}

/// Installs the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `info`. If the log file cannot be opened
/// the launcher still runs with stderr output only; the returned path is
/// `None` in that case.
pub fn init(root: &Path) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).compact();

    match open_log_file(root) {
        Ok((log_path, file)) => {
            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(log_path)
        }
        Err(err) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            tracing::warn!(err = %format!("{err:#}"), "file logging disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_log_file_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (log_path, _file) = open_log_file(tmp.path()).unwrap();
        assert!(log_path.exists());
        assert_eq!(log_path, paths::logs_dir(tmp.path()).join(LOG_FILE_NAME));
    }

    #[test]
    fn open_log_file_appends() {
        use std::io::Write;

        let tmp = tempfile::tempdir().unwrap();
        let (log_path, mut file) = open_log_file(tmp.path()).unwrap();
        writeln!(file, "first").unwrap();
        drop(file);

        let (_, mut file) = open_log_file(tmp.path()).unwrap();
        writeln!(file, "second").unwrap();
        drop(file);

        let contents = fs::read_to_string(log_path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }
}
