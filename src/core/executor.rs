//! Command execution seam shared by every helper.
//!
//! Release management, hooks and the peripheral helpers never spawn processes
//! themselves: they compose shell text and hand it to an [`Executor`], which
//! either runs it locally (`sh -c`) or over SSH. Tests substitute their own
//! executors to inject failures.

use serde::Serialize;

use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::ssh::execute_local_command_in_dir;
use crate::utils::shell;

/// Captured result of one command.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }

    /// Prefers stderr, falls back to stdout if stderr is empty.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }

    /// Non-empty stdout lines with trailing `\r` removed.
    pub fn lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run the command as this user (via `sudo -u`).
    pub as_user: Option<String>,
    /// Suppress echoing the command to the terminal.
    pub quiet: bool,
    /// Extra environment exported before the command runs.
    pub env: Vec<(String, String)>,
}

impl RunOptions {
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.as_user = Some(user.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Build the final shell text for a command under the given options.
///
/// Environment is exported inside the (possibly sudo-wrapped) shell so it
/// reaches the command on remote hosts too.
pub fn compose_command(command: &str, options: &RunOptions) -> String {
    let mut inner = String::new();
    for (key, value) in &options.env {
        inner.push_str(&format!("export {}={}; ", key, shell::quote_path(value)));
    }
    inner.push_str(command);

    match options.as_user.as_deref() {
        Some(user) => format!(
            "sudo -u {} -H sh -c {}",
            shell::quote_arg(user),
            shell::escape_command_for_shell(&inner)
        ),
        None => inner,
    }
}

/// Anything able to run a shell command and report its outcome.
pub trait Executor {
    /// Run `command` and capture its output. Never fails: spawn errors are
    /// reported as an unsuccessful [`CommandOutput`].
    fn execute(&self, command: &str, options: &RunOptions) -> CommandOutput;

    /// Where commands run, for error reporting.
    fn target(&self) -> TargetDetails;

    /// Run a command and fail on a non-zero exit.
    fn run(&self, command: &str) -> Result<CommandOutput> {
        self.run_with(command, &RunOptions::default())
    }

    fn run_with(&self, command: &str, options: &RunOptions) -> Result<CommandOutput> {
        let output = self.execute(command, options);
        if output.success {
            return Ok(output);
        }

        Err(Error::remote_command_failed(RemoteCommandFailedDetails {
            command: command.to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            target: self.target(),
        }))
    }

    /// Run a command quietly, returning its output whatever the exit status.
    fn run_quiet(&self, command: &str) -> CommandOutput {
        self.execute(command, &RunOptions::quiet())
    }

    fn path_exists(&self, path: &str) -> bool {
        self.run_quiet(&format!("test -e {}", shell::quote_path(path)))
            .success
    }

    fn is_dir(&self, path: &str) -> bool {
        self.run_quiet(&format!("test -d {}", shell::quote_path(path)))
            .success
    }

    /// Target of a symbolic link, or `None` when `path` is not a link.
    fn read_link(&self, path: &str) -> Option<String> {
        let output = self.run_quiet(&format!("readlink {}", shell::quote_path(path)));
        if !output.success {
            return None;
        }
        let target = output.stdout.trim_end_matches(['\n', '\r']).to_string();
        if target.is_empty() {
            None
        } else {
            Some(target)
        }
    }

    /// Names of the visible entries of a directory; empty when it cannot be listed.
    fn list_dir(&self, path: &str) -> Vec<String> {
        let output = self.run_quiet(&format!("ls -1 {}", shell::quote_path(path)));
        if !output.success {
            return Vec::new();
        }
        output.lines()
    }
}

impl<'e> dyn Executor + 'e {
    /// Scope this executor to `dir`.
    pub fn in_dir(&self, dir: impl Into<String>) -> InDir<'_> {
        InDir::new(self, dir)
    }
}

/// Runs commands on the local machine through `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for LocalExecutor {
    fn execute(&self, command: &str, options: &RunOptions) -> CommandOutput {
        if !options.quiet {
            log_status!("local", "{}", command);
        }
        execute_local_command_in_dir(&compose_command(command, options), None, None)
    }

    fn target(&self) -> TargetDetails {
        TargetDetails {
            host: Some("localhost".to_string()),
            user: None,
        }
    }
}

/// Scoped working directory: every command is prefixed with `cd <dir> &&`.
///
/// The previous directory is "restored" simply by not using the scope any
/// more; no process state is changed.
pub struct InDir<'a> {
    inner: &'a dyn Executor,
    dir: String,
}

impl<'a> InDir<'a> {
    pub fn new(inner: &'a dyn Executor, dir: impl Into<String>) -> Self {
        Self {
            inner,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }
}

impl Executor for InDir<'_> {
    fn execute(&self, command: &str, options: &RunOptions) -> CommandOutput {
        let scoped = format!("cd {} && {}", shell::quote_path(&self.dir), command);
        self.inner.execute(&scoped, options)
    }

    fn target(&self) -> TargetDetails {
        self.inner.target()
    }
}
