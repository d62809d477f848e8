//! Executor double for unit tests: records every command and answers from a
//! script of canned outputs.

use std::cell::RefCell;

use crate::error::TargetDetails;
use crate::executor::{CommandOutput, Executor, RunOptions};

#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    calls: RefCell<Vec<(String, RunOptions)>>,
    script: Vec<(String, CommandOutput)>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with `output`. Earlier entries win.
    pub(crate) fn respond(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.script.push((pattern.to_string(), output));
        self
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(c, _)| c.clone()).collect()
    }

    pub(crate) fn options(&self, index: usize) -> RunOptions {
        self.calls.borrow()[index].1.clone()
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, command: &str, options: &RunOptions) -> CommandOutput {
        self.calls
            .borrow_mut()
            .push((command.to_string(), options.clone()));
        self.script
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""))
    }

    fn target(&self) -> TargetDetails {
        TargetDetails {
            host: Some("scripted".to_string()),
            user: None,
        }
    }
}
