//! Child process helpers: blocking runs with captured output, and detached spawns.

use anyhow::{anyhow, Context, Result};
use std::{
    io::Read,
    process::{Child, Command, Stdio},
    sync::mpsc,
    thread,
    time::Duration,
};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Result of a blocking command that was spawned successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal or by the timeout.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }
}

/// How long to wait for the output pipes to close after a timeout kill.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Runs `cmd` to completion, draining stdout/stderr on reader threads.
///
/// With a `timeout`, the child and everything it started are killed once it
/// expires and the output is marked `timed_out`. Spawn failures (program not
/// found, permission denied) are returned as errors.
pub fn run_command(cmd: &mut Command, timeout: Option<Duration>) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    hide_console(cmd);
    own_process_group(cmd);

    let program = cmd.get_program().to_string_lossy().to_string();
    debug!(%program, "spawning child process");
    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawn {program}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_rx = read_in_background(stdout);
    let stderr_rx = read_in_background(stderr);

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().context("wait for command")?,
        Some(limit) => match child.wait_timeout(limit).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(%program, timeout_secs = limit.as_secs(), "command timed out, killing");
                timed_out = true;
                kill_tree(&mut child)?;
                child.wait().context("wait command after kill")?
            }
        },
    };

    // After a kill, a process that escaped the tree may still hold the pipes.
    let grace = timed_out.then_some(OUTPUT_GRACE);
    let stdout = collect_output(&stdout_rx, grace).context("collect stdout")?;
    let stderr = collect_output(&stderr_rx, grace).context("collect stderr")?;

    let code = if timed_out { None } else { status.code() };
    debug!(%program, exit_code = ?code, timed_out, "command finished");
    Ok(CommandOutput {
        code,
        stdout,
        stderr,
        timed_out,
    })
}

/// Spawns `cmd` without a console and without keeping a handle to it.
///
/// Returns the child's pid. The child is not waited on; once this process
/// exits the OS owns it.
pub fn spawn_detached(cmd: &mut Command) -> Result<u32> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    detach(cmd);

    let program = cmd.get_program().to_string_lossy().to_string();
    let child = cmd
        .spawn()
        .with_context(|| format!("spawn {program}"))?;
    Ok(child.id())
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
/// `CREATE_NO_WINDOW` is ignored alongside `DETACHED_PROCESS`, so it is not set here.
#[cfg(windows)]
const DETACH_FLAGS: u32 = 0x0000_0008 | 0x0000_0200; // DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP

#[cfg(windows)]
fn hide_console(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_cmd: &mut Command) {}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> Result<()> {
    // The child leads its own process group, so this also reaches its children.
    let pgid = child.id() as libc::pid_t;
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        child.kill().context("kill command")?;
    }
    Ok(())
}

#[cfg(windows)]
fn kill_tree(child: &mut Child) -> Result<()> {
    let mut taskkill = Command::new("taskkill");
    taskkill
        .args(["/T", "/F", "/PID", &child.id().to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    hide_console(&mut taskkill);
    match taskkill.status() {
        Ok(status) if status.success() => Ok(()),
        _ => child.kill().context("kill command"),
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_tree(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    cmd.creation_flags(DETACH_FLAGS);
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    // Own process group, so a Ctrl-C in the launching shell does not reach the UI.
    own_process_group(cmd);
}

#[cfg(not(any(windows, unix)))]
fn detach(_cmd: &mut Command) {}

fn read_to_string_lossy<R: Read>(mut reader: R) -> Result<String> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).context("read output")?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn read_in_background<R: Read + Send + 'static>(reader: R) -> mpsc::Receiver<Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(read_to_string_lossy(reader));
    });
    rx
}

/// Waits for a reader thread. With a `grace` period, gives up after it and
/// returns what is known (nothing) instead of blocking.
fn collect_output(rx: &mpsc::Receiver<Result<String>>, grace: Option<Duration>) -> Result<String> {
    match grace {
        None => rx
            .recv()
            .map_err(|_| anyhow!("output reader thread panicked"))?,
        Some(grace) => match rx.recv_timeout(grace) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("output pipe still open after kill, dropping output");
                Ok(String::new())
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(anyhow!("output reader thread panicked"))
            }
        },
    }
}
