//! Subprocess execution utilities.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// How often a running child is polled while waiting with a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for pipe readers after killing a timed-out child.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

/// Result of [`ProcessBuilder::exec_with_timeout`].
#[derive(Debug)]
pub enum TimedOutput {
    /// The child exited on its own.
    Completed(Output),
    /// The deadline passed and the child was killed. Holds whatever was
    /// captured before the kill.
    TimedOut { stdout: Vec<u8>, stderr: Vec<u8> },
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    fn spawn_piped(&self) -> Result<Child> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd.spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let child = self.spawn_piped()?;
        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }

    /// Execute the command, killing it if it runs longer than `timeout`.
    pub fn exec_with_timeout(&self, timeout: Duration) -> Result<TimedOutput> {
        let mut child = self.spawn_piped()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                break Some(status);
            }
            if Instant::now() >= deadline {
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        match status {
            Some(status) => {
                // Background grandchildren can hold the pipes open past exit.
                let drain_deadline = deadline.max(Instant::now() + DRAIN_GRACE);
                match (
                    recv_until(&stdout, drain_deadline),
                    recv_until(&stderr, drain_deadline),
                ) {
                    (Some(stdout), Some(stderr)) => Ok(TimedOutput::Completed(Output {
                        status,
                        stdout,
                        stderr,
                    })),
                    (stdout, stderr) => {
                        tracing::debug!(
                            "`{}` exited but its output pipes stayed open past {:?}",
                            self.display_command(),
                            timeout
                        );
                        Ok(TimedOutput::TimedOut {
                            stdout: stdout.unwrap_or_default(),
                            stderr: stderr.unwrap_or_default(),
                        })
                    }
                }
            }
            None => {
                tracing::debug!(
                    "`{}` exceeded {:?}, killing",
                    self.display_command(),
                    timeout
                );
                if let Err(e) = child.kill() {
                    tracing::debug!("failed to kill `{}`: {}", self.display_command(), e);
                }
                let _ = child.wait();
                let drain_deadline = Instant::now() + DRAIN_GRACE;
                Ok(TimedOutput::TimedOut {
                    stdout: recv_until(&stdout, drain_deadline).unwrap_or_default(),
                    stderr: recv_until(&stderr, drain_deadline).unwrap_or_default(),
                })
            }
        }
    }

    /// Execute and return status only, inheriting stdio.
    pub fn status(&self) -> Result<ExitStatus> {
        let mut cmd = self.build_command();
        cmd.status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Read a pipe to the end on a helper thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf) {
                tracing::debug!("failed to read child output: {}", e);
            }
        }
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a pipe reader until `deadline`. `None` if it has not finished.
fn recv_until(rx: &mpsc::Receiver<Vec<u8>>, deadline: Instant) -> Option<Vec<u8>> {
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Some(buf),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(Vec::new()),
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Last `n` lines of a process stream, for error messages.
pub fn tail_lines(bytes: &[u8], n: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
