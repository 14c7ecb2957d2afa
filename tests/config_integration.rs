#[path = "../src/config.rs"]
mod config;
#[path = "../src/paths.rs"]
mod paths;

use config::{ConfigFile, Dependencies, InstallFailurePolicy};
use std::fs;

#[test]
fn load_config_without_file_uses_defaults_under_root() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    let cfg = config::load_config(&paths::config_path(root), false, root, ConfigFile::default()).unwrap();

    assert_eq!(cfg.script, root.join("adVideo_UI.py"));
    assert_eq!(cfg.install_failure, InstallFailurePolicy::Continue);
}

#[test]
fn command_line_overrides_win_over_file() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(
        paths::config_path(root),
        r#"
python = "py"
script = "ui/adVideo_UI.py"
requirements = "requirements.txt"
install_attempts = 2
"#,
    )
    .unwrap();

    let overrides = ConfigFile {
        packages: Some(vec!["pandas".to_string()]),
        install_failure: Some(InstallFailurePolicy::Abort),
        ..ConfigFile::default()
    };
    let cfg = config::load_config(&paths::config_path(root), false, root, overrides).unwrap();

    assert_eq!(cfg.python, "py");
    assert_eq!(cfg.script, root.join("ui").join("adVideo_UI.py"));
    assert_eq!(cfg.dependencies, Dependencies::Packages(vec!["pandas".to_string()]));
    assert_eq!(cfg.install_failure, InstallFailurePolicy::Abort);
    assert_eq!(cfg.install_attempts, 2);
}

#[test]
fn invalid_file_names_the_path() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let path = paths::config_path(root);
    fs::write(&path, "install_attempts = 0\n").unwrap();

    let err = config::load_config(&path, false, root, ConfigFile::default()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("launcher.toml"));
    assert!(msg.contains("install_attempts"));
}

#[test]
fn malformed_toml_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let path = paths::config_path(root);
    fs::write(&path, "packages = [\n").unwrap();

    let err = config::load_config(&path, false, root, ConfigFile::default()).unwrap_err();
    assert!(err.to_string().contains("parse"));
}

#[test]
fn shipped_sample_config_matches_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let sample = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("launcher.toml");

    let cfg = config::load_config(&sample, true, root, ConfigFile::default()).unwrap();
    let mut defaults = config::LauncherConfig::default();
    defaults.resolve_paths(root);
    assert_eq!(cfg, defaults);
}

#[test]
fn explicit_config_path_must_exist() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let typo = root.join("launcer.toml");

    let err = config::load_config(&typo, true, root, ConfigFile::default()).unwrap_err();
    assert!(format!("{err:#}").contains("does not exist"));
}
