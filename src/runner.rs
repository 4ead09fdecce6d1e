//! Process Runner
//!
//! The ONLY sanctioned way to execute external tools. Every command goes
//! through an [`Exec`] backend so that:
//!
//! - Children are spawned in their own process group and tracked by the
//!   [`ChildRegistry`] (clean teardown on interrupt)
//! - Failures carry the full command line and its combined output
//! - Tests can substitute a recording backend and run plans headless
//!
//! [`Runner`] is the façade plans use: `run`, `output`, `output_within`,
//! `silent`, `download`, and the privilege-boundary variants `sudo_run` /
//! `sudo_run_as`. There are no retries at this layer.

use crate::error::{NodeError, Result};
use crate::process_guard::{kill_group, ChildRegistry, CommandProcessGroup};
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What to do with a command's output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Keep stdout and stderr (stderr used for error context)
    Combined,
    /// Keep stdout only, stderr is discarded
    Stdout,
    /// Discard both streams
    Discard,
}

/// A fully described command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub capture: Capture,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I, capture: Capture) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(|a| a.as_ref().to_string()).collect(),
            capture,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Command line as a single string, for logs and error messages
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (None if terminated by signal)
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (false, true) => out.to_string(),
            (false, false) => format!("{}\n{}", out, err),
        }
    }
}

/// Backend that actually executes commands.
pub trait Exec: Send + Sync {
    /// Run `spec` to completion. Errors only when the command cannot be
    /// started or exceeds its timeout; a non-zero exit is returned as output.
    fn exec(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Executes commands on the local host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExec;

impl Exec for SystemExec {
    fn exec(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.command_line();
        debug!(cmd = %line, "exec");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null()).in_new_process_group();
        match spec.capture {
            Capture::Combined => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            Capture::Stdout => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::null());
            }
            Capture::Discard => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| NodeError::exec(&line, format!("failed to start: {}", e)))?;
        let pid = child.id();
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        // Drain pipes on their own threads so a chatty child never blocks
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let waited = match spec.timeout {
            None => child.wait().map(Some),
            Some(limit) => wait_with_deadline(&mut child, limit),
        };

        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(cmd = %line, "deadline exceeded, killing process group");
                kill_group(pid);
                let _ = child.wait();
                unregister(pid);
                return Err(NodeError::Timeout {
                    cmd: line,
                    timeout: spec.timeout.unwrap_or_default(),
                });
            }
            Err(e) => {
                unregister(pid);
                return Err(NodeError::exec(&line, format!("failed waiting: {}", e)));
            }
        };
        unregister(pid);

        Ok(CommandOutput {
            code: status.code(),
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn unregister(pid: u32) {
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Poll until the child exits or `limit` elapses; `Ok(None)` means timed out.
fn wait_with_deadline(
    child: &mut std::process::Child,
    limit: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= limit {
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Façade over an [`Exec`] backend with the calling conventions plans need.
#[derive(Clone)]
pub struct Runner {
    exec: Arc<dyn Exec>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner").finish_non_exhaustive()
    }
}

impl Runner {
    pub fn new(exec: Arc<dyn Exec>) -> Self {
        Self { exec }
    }

    /// Runner backed by the local host
    pub fn system() -> Self {
        Self::new(Arc::new(SystemExec))
    }

    /// Run a command; a non-zero exit fails with the combined output.
    pub fn run<I, S>(&self, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let spec = CommandSpec::new(program, args, Capture::Combined);
        let out = self.exec.exec(&spec)?;
        if out.success() {
            Ok(())
        } else {
            Err(NodeError::exec(spec.command_line(), out.combined()))
        }
    }

    /// Run a command and return its trimmed stdout.
    pub fn output<I, S>(&self, program: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.checked_stdout(CommandSpec::new(program, args, Capture::Stdout))
    }

    /// As [`Runner::output`], killed after `timeout`.
    pub fn output_within<I, S>(&self, timeout: Duration, program: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.checked_stdout(CommandSpec::new(program, args, Capture::Stdout).with_timeout(timeout))
    }

    /// Run with both streams discarded; only the exit status matters.
    pub fn silent<I, S>(&self, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let spec = CommandSpec::new(program, args, Capture::Discard);
        let out = self.exec.exec(&spec)?;
        if out.success() {
            Ok(())
        } else {
            Err(NodeError::exec(
                spec.command_line(),
                format!("exit code {}", out.code.unwrap_or(-1)),
            ))
        }
    }

    /// `true` when the command exits zero. For probes only.
    pub fn succeeds<I, S>(&self, program: &str, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.silent(program, args).is_ok()
    }

    /// Run and return the raw output regardless of exit status.
    /// Used where the tool's machine-readable output matters more than its
    /// exit code (gpg status transcripts).
    pub fn transcript<I, S>(&self, program: &str, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exec.exec(&CommandSpec::new(program, args, Capture::Combined))
    }

    /// Run as root through sudo.
    pub fn sudo_run<I, S>(&self, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut full = vec![program.to_string()];
        full.extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self.run("sudo", full)
    }

    /// Run as `user` through sudo.
    pub fn sudo_run_as<I, S>(&self, user: &str, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut full = vec!["-u".to_string(), user.to_string(), program.to_string()];
        full.extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self.run("sudo", full)
    }

    /// Fetch `url` into `dest`, overwriting it. Prefers wget (quiet, non-zero
    /// on HTTP errors), falls back to curl.
    pub fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let dest_str = dest.to_string_lossy();
        let result = if self.succeeds("which", ["wget"]) {
            self.run("wget", ["-q", "-O", dest_str.as_ref(), url])
        } else if self.succeeds("which", ["curl"]) {
            self.run("curl", ["-fsSL", "-o", dest_str.as_ref(), url])
        } else {
            return Err(NodeError::preflight("neither wget nor curl is installed"));
        };

        result.map_err(|e| NodeError::Download {
            url: url.to_string(),
            reason: match e {
                NodeError::ExecFailed { output, .. } if !output.is_empty() => output,
                other => other.to_string(),
            },
        })?;
        info!(url, dest = %dest.display(), "downloaded");
        Ok(())
    }

    fn checked_stdout(&self, spec: CommandSpec) -> Result<String> {
        let out = self.exec.exec(&spec)?;
        if out.success() {
            Ok(out.stdout.trim().to_string())
        } else {
            Err(NodeError::exec(spec.command_line(), out.combined()))
        }
    }
}
