use crate::mediasort_core::error::{MediaSortError, Result};
use crate::mediasort_core::metadata::exiftool_available;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run `cmd` to completion, killing it if it is still running after `timeout`.
///
/// Stdout and stderr are drained on helper threads so a chatty child cannot
/// block on a full pipe while we wait for it.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<ToolOutput> {
    let tool = cmd.get_program().to_string_lossy().to_string();
    log::debug!("Running {:?} (timeout {:?})", cmd, timeout);

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            log::warn!("{} exceeded {:?}, killing it", tool, timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Err(MediaSortError::ToolTimeout { tool, timeout });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    Ok(ToolOutput {
        status,
        stdout,
        stderr,
    })
}

/// Check if `program` can be started at all. The probe's exit status is ignored
/// because some tools print usage and exit non-zero for a version flag.
pub fn tool_available(program: &str, probe_arg: &str) -> bool {
    Command::new(program)
        .arg(probe_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Fail with `MissingDependency` unless exiftool, the converter and ffmpeg can all be started.
pub fn check_dependencies(converter: &str, ffmpeg: &str) -> Result<()> {
    if !exiftool_available() {
        return Err(MediaSortError::MissingDependency("exiftool".to_string()));
    }
    if !tool_available(converter, "--version") {
        return Err(MediaSortError::MissingDependency(converter.to_string()));
    }
    if !tool_available(ffmpeg, "-version") {
        return Err(MediaSortError::MissingDependency(ffmpeg.to_string()));
    }
    log::debug!("Found exiftool, {} and {}", converter, ffmpeg);
    Ok(())
}
