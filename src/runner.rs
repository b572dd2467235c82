use anyhow::{Context, Result};
use declarative::CommandOutput;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A command was killed after exceeding its wall-clock limit
#[derive(Debug, thiserror::Error)]
#[error("command timed out after {}s", .0.as_secs())]
pub struct TimedOut(pub Duration);

/// Run a command and capture its output, whatever the exit status
pub fn run_output(cmd: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;
    Ok(output.into())
}

/// Run a command and capture stdout, failing on a non-zero exit
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = run_output(cmd, args)?;

    if output.success {
        Ok(output.stdout_str().trim().to_string())
    } else {
        anyhow::bail!(
            "{} {} failed: {}",
            cmd,
            args.join(" "),
            output.failure_message()
        )
    }
}

/// Run a command and fail on a non-zero exit, discarding stdout
pub fn run_checked(cmd: &str, args: &[&str]) -> Result<()> {
    run_capture(cmd, args).map(drop)
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run `command` through `sh -c`
///
/// `path` replaces `PATH` for the child. The shell leads its own process
/// group; with a `timeout`, the whole group is killed once the limit passes
/// and a [`TimedOut`] error is returned.
pub fn run_shell(
    command: &str,
    cwd: Option<&Path>,
    path: Option<&str>,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(path) = path {
        cmd.env("PATH", path);
    }

    log::debug!("sh -c {command:?}");
    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to execute: sh -c {command:?}"))?;

    // Drain both pipes so a chatty child never blocks on a full buffer
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        None => child.wait().context("Failed to wait for command")?,
        Some(limit) => wait_with_deadline(&mut child, limit)?,
    };

    Ok(CommandOutput {
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        success: status.success(),
        code: status.code(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> Result<std::process::ExitStatus> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().context("Failed to wait for command")? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            kill_group(child);
            return Err(TimedOut(limit).into());
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill `child` and everything it spawned, then reap it
fn kill_group(child: &mut Child) {
    // The child's pid is its process group id
    let group = format!("-{}", child.id());
    if !run_quiet("kill", &["-KILL", "--", &group]) {
        log::warn!("Failed to kill process group {}", child.id());
    }
    let _ = child.kill();
    let _ = child.wait();
}
