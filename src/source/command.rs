// src/source/command.rs
//
// Capture command source. Runs the command through the shell (so pipes and
// arguments work as typed, e.g. `candump -a can0`) and reads its stdout one
// line at a time. The command's stderr is forwarded into the log.

use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{FrameSource, Poll, ReaderSource};
use crate::error::MonitorError;

/// Shell exit codes for "not found" (127) and "not executable" (126).
const SHELL_LAUNCH_FAILURES: [i32; 2] = [126, 127];

/// How long to wait for the shell's exit status once stdout closes empty.
const EXIT_STATUS_WAIT: Duration = Duration::from_secs(1);

pub struct CommandSource {
    label: String,
    child: Child,
    stdout: ReaderSource<BufReader<ChildStdout>>,
    stderr_thread: Option<JoinHandle<()>>,
    produced_output: bool,
    closed: bool,
}

impl CommandSource {
    /// Start the capture command. Fails if the shell cannot be spawned.
    pub fn spawn(command: &str) -> Result<Self, MonitorError> {
        let label = format!("command({})", command);

        if command.trim().is_empty() {
            return Err(MonitorError::source_unavailable(&label, "empty capture command"));
        }

        let mut child = shell_command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MonitorError::source_unavailable(&label, e.to_string()))?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MonitorError::source_unavailable(&label, "stdout not captured"));
            }
        };

        let stderr_thread = child.stderr.take().and_then(|stderr| {
            thread::Builder::new()
                .name("capture-stderr".to_string())
                .spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        tlog!("[capture] {}", line);
                    }
                })
                .ok()
        });

        tlog!("[capture] Started {} (pid {})", label, child.id());

        Ok(Self {
            stdout: ReaderSource::new(label.clone(), BufReader::new(stdout)),
            label,
            child,
            stderr_thread,
            produced_output: false,
            closed: false,
        })
    }

    /// Exit status of the child, waiting up to `EXIT_STATUS_WAIT` for it.
    fn exit_status(&mut self) -> io::Result<Option<ExitStatus>> {
        let deadline = Instant::now() + EXIT_STATUS_WAIT;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Stdout closed before the first line. The shell always starts, so a
    /// capture tool that is missing or not executable only shows up here.
    fn check_launch(&mut self) -> io::Result<()> {
        match self.exit_status()? {
            Some(status)
                if status
                    .code()
                    .is_some_and(|code| SHELL_LAUNCH_FAILURES.contains(&code)) =>
            {
                Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("capture command could not be started ({})", status),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Stop the child if it is still running and reap it.
    fn reap(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.child.try_wait() {
            Ok(Some(status)) => tlog!("[capture] {} exited: {}", self.label, status),
            Ok(None) => {
                let _ = self.child.kill();
                match self.child.wait() {
                    Ok(status) => tlog!("[capture] {} terminated: {}", self.label, status),
                    Err(e) => tlog!("[capture] {} could not be reaped: {}", self.label, e),
                }
            }
            Err(e) => tlog!("[capture] {} status unavailable: {}", self.label, e),
        }

        // A grandchild may still hold stderr open; let the forwarder finish on its own
        self.stderr_thread.take();
    }
}

impl FrameSource for CommandSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn poll_line(&mut self) -> io::Result<Poll> {
        let poll = self.stdout.poll_line()?;
        match poll {
            Poll::Line(_) => self.produced_output = true,
            Poll::Closed if !self.produced_output => self.check_launch()?,
            _ => {}
        }
        Ok(poll)
    }

    fn close(&mut self) {
        self.reap();
    }
}

impl Drop for CommandSource {
    fn drop(&mut self) {
        self.reap();
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
