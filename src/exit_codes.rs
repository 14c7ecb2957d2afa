//! Stable exit codes for the launcher.

/// The UI was started (install failures under the `continue` policy included).
pub const OK: i32 = 0;
/// Invalid configuration or an unexpected error.
pub const INVALID: i32 = 1;
/// The Python interpreter could not be run.
pub const RUNTIME_MISSING: i32 = 2;
/// Dependency install failed and `install_failure = "abort"`.
pub const INSTALL_FAILED: i32 = 3;
/// Spawning the UI process failed.
pub const LAUNCH_FAILED: i32 = 4;
