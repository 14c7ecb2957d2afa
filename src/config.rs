//! Launcher configuration stored in `launcher.toml` next to the executable.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::paths;

pub const DEFAULT_SCRIPT: &str = "adVideo_UI.py";

/// Third-party packages needed by the UI and the renamer/metadata scripts it
/// runs. `pandas.read_excel` needs `openpyxl` for `.xlsx` and `xlrd` for
/// `.xls`. `tkinter` ships with Python.
pub const DEFAULT_PACKAGES: &[&str] = &["requests", "pandas", "openpyxl", "xlrd"];

#[cfg(windows)]
pub const DEFAULT_WINDOWED_PYTHON: &str = "pythonw";
#[cfg(not(windows))]
pub const DEFAULT_WINDOWED_PYTHON: &str = "python";

/// What to do when the dependency install step does not succeed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstallFailurePolicy {
    /// Log a warning and start the UI anyway.
    #[default]
    Continue,
    /// Stop before launching.
    Abort,
}

/// How the UI's dependencies are declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependencies {
    Packages(Vec<String>),
    Requirements(PathBuf),
}

impl Default for Dependencies {
    fn default() -> Self {
        Dependencies::Packages(DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect())
    }
}

/// On-disk shape of `launcher.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub python: Option<String>,
    pub pythonw: Option<String>,
    pub script: Option<PathBuf>,
    pub packages: Option<Vec<String>>,
    pub requirements: Option<PathBuf>,
    pub install_failure: Option<InstallFailurePolicy>,
    pub install_attempts: Option<u32>,
    pub install_timeout_secs: Option<u64>,
}

/// Resolved configuration used by the bootstrap sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Interpreter used for the version check and for pip.
    pub python: String,
    /// Interpreter used to start the UI without a console window.
    pub pythonw: String,
    pub script: PathBuf,
    pub dependencies: Dependencies,
    pub install_failure: InstallFailurePolicy,
    pub install_attempts: u32,
    pub install_timeout_secs: Option<u64>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            pythonw: DEFAULT_WINDOWED_PYTHON.to_string(),
            script: PathBuf::from(DEFAULT_SCRIPT),
            dependencies: Dependencies::default(),
            install_failure: InstallFailurePolicy::Continue,
            install_attempts: 1,
            install_timeout_secs: None,
        }
    }
}

impl LauncherConfig {
    /// Applies every field set in `overrides`. Used for both the config file
    /// and command-line flags.
    pub fn apply(&mut self, overrides: ConfigFile) -> Result<()> {
        let ConfigFile {
            python,
            pythonw,
            script,
            packages,
            requirements,
            install_failure,
            install_attempts,
            install_timeout_secs,
        } = overrides;

        match (packages, requirements) {
            (Some(_), Some(_)) => bail!("`packages` and `requirements` are mutually exclusive"),
            (Some(packages), None) => self.dependencies = Dependencies::Packages(packages),
            (None, Some(path)) => self.dependencies = Dependencies::Requirements(path),
            (None, None) => {}
        }
        if let Some(python) = python {
            self.python = python;
        }
        if let Some(pythonw) = pythonw {
            self.pythonw = pythonw;
        }
        if let Some(script) = script {
            self.script = script;
        }
        if let Some(policy) = install_failure {
            self.install_failure = policy;
        }
        if let Some(attempts) = install_attempts {
            self.install_attempts = attempts;
        }
        if install_timeout_secs.is_some() {
            self.install_timeout_secs = install_timeout_secs;
        }
        Ok(())
    }

    pub fn resolve_paths(&mut self, root: &Path) {
        self.script = paths::resolve(root, &self.script);
        if let Dependencies::Requirements(path) = &self.dependencies {
            self.dependencies = Dependencies::Requirements(paths::resolve(root, path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.python.trim().is_empty() {
            return Err(anyhow!("python must be a non-empty command"));
        }
        if self.pythonw.trim().is_empty() {
            return Err(anyhow!("pythonw must be a non-empty command"));
        }
        if self.script.as_os_str().is_empty() {
            return Err(anyhow!("script must be a non-empty path"));
        }
        if self.install_attempts == 0 {
            return Err(anyhow!("install_attempts must be >= 1"));
        }
        if self.install_timeout_secs == Some(0) {
            return Err(anyhow!("install_timeout_secs must be > 0"));
        }
        if let Dependencies::Packages(packages) = &self.dependencies {
            if packages.iter().any(|p| p.trim().is_empty()) {
                return Err(anyhow!("packages must not contain empty names"));
            }
        }
        Ok(())
    }
}

/// Parses a config file.
///
/// A missing file yields `ConfigFile::default()` unless `required` is set,
/// as it is for a path given explicitly on the command line.
pub fn read_config_file(path: &Path, required: bool) -> Result<ConfigFile> {
    if !path.exists() {
        if required {
            bail!("config file {} does not exist", path.display());
        }
        return Ok(ConfigFile::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Loads the config file at `path`, layers `overrides` (command-line flags)
/// on top, then resolves relative paths against `root` and validates.
pub fn load_config(
    path: &Path,
    required: bool,
    root: &Path,
    overrides: ConfigFile,
) -> Result<LauncherConfig> {
    let file = read_config_file(path, required)?;
    let mut cfg = LauncherConfig::default();
    cfg.apply(file)
        .with_context(|| format!("invalid config {}", path.display()))?;
    cfg.apply(overrides).context("invalid command-line overrides")?;
    cfg.resolve_paths(root);
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_ui_launcher() {
        let cfg = LauncherConfig::default();
        assert_eq!(cfg.python, "python");
        assert_eq!(cfg.script, PathBuf::from("adVideo_UI.py"));
        assert_eq!(
            cfg.dependencies,
            Dependencies::Packages(vec![
                "requests".to_string(),
                "pandas".to_string(),
                "openpyxl".to_string(),
                "xlrd".to_string()
            ])
        );
        assert_eq!(cfg.install_failure, InstallFailurePolicy::Continue);
        assert_eq!(cfg.install_attempts, 1);
        assert_eq!(cfg.install_timeout_secs, None);
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let file = read_config_file(&tmp.path().join("launcher.toml"), false).unwrap();
        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_config_file(&tmp.path().join("lancher.toml"), true).unwrap_err();
        assert!(err.to_string().contains("lancher.toml"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn parses_requirements_variant() {
        let file: ConfigFile = toml::from_str(
            r#"
python = "py"
requirements = "requirements.txt"
install_failure = "abort"
install_attempts = 3
install_timeout_secs = 600
"#,
        )
        .unwrap();
        let root = PathBuf::from("root");
        let mut cfg = LauncherConfig::default();
        cfg.apply(file).unwrap();
        cfg.resolve_paths(&root);
        assert_eq!(cfg.python, "py");
        assert_eq!(
            cfg.dependencies,
            Dependencies::Requirements(root.join("requirements.txt"))
        );
        assert_eq!(cfg.install_failure, InstallFailurePolicy::Abort);
        assert_eq!(cfg.install_attempts, 3);
        assert_eq!(cfg.install_timeout_secs, Some(600));
        assert_eq!(cfg.script, root.join("adVideo_UI.py"));
    }

    #[test]
    fn rejects_packages_and_requirements_together() {
        let file: ConfigFile = toml::from_str(
            r#"
packages = ["requests"]
requirements = "requirements.txt"
"#,
        )
        .unwrap();
        let err = LauncherConfig::default().apply(file).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = toml::from_str::<ConfigFile>("scirpt = \"ui.py\"").unwrap_err();
        assert!(err.to_string().contains("scirpt"));
    }

    #[test]
    fn validate_rejects_zero_attempts_and_timeout() {
        let mut cfg = LauncherConfig {
            install_attempts: 0,
            ..LauncherConfig::default()
        };
        assert!(cfg.validate().is_err());
        cfg.install_attempts = 1;
        cfg.install_timeout_secs = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_package_names() {
        let cfg = LauncherConfig {
            dependencies: Dependencies::Packages(vec!["pandas".to_string(), " ".to_string()]),
            ..LauncherConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("empty names"));
    }

    #[test]
    fn overrides_replace_dependency_kind() {
        let mut cfg = LauncherConfig::default();
        cfg.apply(ConfigFile {
            requirements: Some(PathBuf::from("req.txt")),
            ..ConfigFile::default()
        })
        .unwrap();
        assert_eq!(
            cfg.dependencies,
            Dependencies::Requirements(PathBuf::from("req.txt"))
        );

        cfg.apply(ConfigFile {
            packages: Some(vec!["numpy".to_string()]),
            ..ConfigFile::default()
        })
        .unwrap();
        assert_eq!(
            cfg.dependencies,
            Dependencies::Packages(vec!["numpy".to_string()])
        );
    }
}
