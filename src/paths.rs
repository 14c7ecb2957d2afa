use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const ROOT_ENV: &str = "ADVIDEO_LAUNCHER_ROOT";
pub const CONFIG_FILE_NAME: &str = "launcher.toml";

pub fn self_path() -> Result<PathBuf> {
    std::env::current_exe().context("current_exe")
}

/// Launcher root, always absolute.
pub fn root_dir() -> Result<PathBuf> {
    if let Ok(dev_root) = std::env::var(ROOT_ENV) {
        if !dev_root.trim().is_empty() {
            let dev_root = PathBuf::from(dev_root);
            if dev_root.is_absolute() {
                return Ok(dev_root);
            }
            let cwd = std::env::current_dir().context("current_dir")?;
            return Ok(cwd.join(dev_root));
        }
    }
    let exe = self_path()?;
    Ok(exe.parent().context("exe has no parent")?.to_path_buf())
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

pub fn runtime_dir(root: &Path) -> PathBuf {
    root.join(".runtime")
}

pub fn logs_dir(root: &Path) -> PathBuf {
    runtime_dir(root).join("logs")
}

pub fn state_path(root: &Path) -> PathBuf {
    runtime_dir(root).join("state.json")
}

/// Joins `path` onto `root` unless it is already absolute.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
