//! External command execution.
//!
//! Every external tool (control tool, `uname`, `sysctl`, auxiliary scripts)
//! is reached through [`CommandRunner`], so the lifecycle can be exercised
//! against a scripted host in tests.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Invocation {
    /// Program name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
}

impl Invocation {
    /// Creates an invocation of `program` with `args`.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a user-supplied command line.
    ///
    /// The first whitespace-separated token is the program, the rest are
    /// arguments. No quoting rules apply. Returns `None` for a blank string.
    #[must_use]
    pub fn parse(command: &str) -> Option<Self> {
        let mut tokens = command.split_whitespace();
        let program = tokens.next()?;
        Some(Self::new(program, tokens))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of running a command to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// A zero exit with the given stdout.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A non-zero exit with the given stderr.
    #[must_use]
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command exited with status 0.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Exit status and any captured output, for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        let status = self
            .code
            .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit status {c}"));
        let output = [self.stdout.trim(), self.stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        if output.is_empty() {
            status
        } else {
            format!("{status}; {output}")
        }
    }
}

/// A process started without waiting for it.
#[derive(Debug)]
pub struct LaunchedProcess {
    pid: Option<u32>,
    child: Option<Child>,
}

impl LaunchedProcess {
    /// Wraps a spawned child.
    #[must_use]
    pub fn from_child(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Some(child),
        }
    }

    /// A launched process that is not owned by this runner.
    #[must_use]
    pub const fn detached(pid: Option<u32>) -> Self {
        Self { pid, child: None }
    }

    /// Returns the OS process id, if known.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Waits for the process to exit and returns its exit code.
    ///
    /// Returns `None` for detached processes or when the status cannot be
    /// collected.
    pub async fn wait(self) -> Option<i32> {
        let mut child = self.child?;
        match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::debug!(pid = ?self.pid, error = %e, "failed to reap launched process");
                None
            }
        }
    }
}

/// Runs external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation` to completion and captures its output.
    ///
    /// A non-zero exit is reported in [`CommandOutput::code`], not as an error.
    ///
    /// # Errors
    /// Returns an error if the program cannot be executed at all.
    async fn output(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;

    /// Starts `invocation` without waiting for it to finish.
    ///
    /// # Errors
    /// Returns an error if the program cannot be executed.
    async fn launch(&self, invocation: &Invocation) -> std::io::Result<LaunchedProcess>;
}

/// [`CommandRunner`] backed by real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a system runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).stdin(Stdio::null());
        cmd
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        tracing::debug!(command = %invocation, "running");
        let output = Self::command(invocation).output().await?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn launch(&self, invocation: &Invocation) -> std::io::Result<LaunchedProcess> {
        tracing::debug!(command = %invocation, "launching");
        let child = Self::command(invocation).spawn()?;
        Ok(LaunchedProcess::from_child(child))
    }
}
