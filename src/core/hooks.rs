//! Shell-command hooks bound to lifecycle signals.
//!
//! Hooks are shell commands configured per site/environment under signal
//! names (`pre_activate_release`, `post_deploy`, ...). [`attach`] turns each
//! configured list into a [`SignalBus`] callback that runs the commands
//! through the deploy executor, after expanding `{{var}}` placeholders.

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::signals::SignalBus;
use crate::utils::template;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A map of signal names to command lists.
pub type HookMap = BTreeMap<String, Vec<String>>;

/// Result of running a single hook command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookCommandResult {
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Result of running all hooks for an event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookRunResult {
    pub event: String,
    pub commands: Vec<HookCommandResult>,
    pub all_succeeded: bool,
}

/// Whether hook failures abort the operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookFailureMode {
    /// Non-zero exit stops remaining hooks and returns an error.
    #[default]
    Fatal,
    /// Failures are recorded but execution continues.
    NonFatal,
}

/// Run a list of commands as hooks for a given event.
pub fn run_commands(
    executor: &dyn Executor,
    commands: &[String],
    event: &str,
    failure_mode: HookFailureMode,
) -> Result<HookRunResult> {
    let mut results = Vec::new();
    let mut all_succeeded = true;

    for command in commands {
        let output = executor.execute(command, &Default::default());

        let result = HookCommandResult {
            command: command.clone(),
            success: output.success,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            exit_code: output.exit_code,
        };

        if !output.success {
            all_succeeded = false;

            if failure_mode == HookFailureMode::Fatal {
                return Err(Error::internal_unexpected(format!(
                    "Hook '{}' command failed: {}\n{}",
                    event,
                    command,
                    output.error_text()
                )));
            }

            log_status!(
                "hook",
                "'{}' command failed (continuing): {}",
                event,
                command
            );
        }

        results.push(result);
    }

    Ok(HookRunResult {
        event: event.to_string(),
        commands: results,
        all_succeeded,
    })
}

/// Register every configured hook on `bus`.
///
/// Commands are expanded with `vars` once, at attach time. Returns the number
/// of signals that received a callback.
pub fn attach<'a>(
    bus: &mut SignalBus<'a>,
    executor: &'a dyn Executor,
    hooks: &HookMap,
    vars: &HashMap<String, String>,
    failure_mode: HookFailureMode,
) -> usize {
    let mut attached = 0;

    for (event, commands) in hooks {
        if commands.is_empty() {
            continue;
        }

        let expanded: Vec<String> = commands
            .iter()
            .map(|c| template::render_map(c, vars))
            .collect();
        let name = event.clone();

        bus.on(event.clone(), move || {
            run_commands(executor, &expanded, &name, failure_mode).map(|_| ())
        });
        attached += 1;
    }

    attached
}
