use clap::Args;
use std::collections::HashMap;

use rollout::config::DeployConfig;
use rollout::executor::{Executor, LocalExecutor};
use rollout::hooks;
use rollout::signals::SignalBus;
use rollout::ssh::SshClient;

pub type CmdResult<T> = rollout::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    /// Explicit config file (`--config`).
    pub config: Option<String>,
}

/// Site and environment every deploy-host command operates on.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Site name (key under `sites` in the config file)
    pub site: String,
    /// Environment name (e.g. prod, staging)
    pub environment: String,
}

/// Resolved configuration plus the executor for its host.
pub(crate) struct Target {
    pub config: DeployConfig,
    executor: Box<dyn Executor>,
}

impl Target {
    pub fn resolve(args: &TargetArgs, global: &GlobalArgs) -> rollout::Result<Self> {
        let config = rollout::config::resolve(global.config.as_deref(), &args.site, &args.environment)?;
        let executor: Box<dyn Executor> = match &config.server {
            Some(server) => Box::new(SshClient::from_server(server)?),
            None => Box::new(LocalExecutor::new()),
        };
        Ok(Self { config, executor })
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// Signal bus with the configured hooks attached, expanded with `vars`.
    pub fn signals(&self, vars: &HashMap<String, String>) -> SignalBus<'_> {
        let mut bus = SignalBus::new();
        hooks::attach(
            &mut bus,
            self.executor(),
            &self.config.hooks,
            vars,
            self.config.hook_failure_mode,
        );
        bus
    }
}

pub mod config;
pub mod db;
pub mod deploy;
pub mod drupal;
pub mod git;
pub mod release;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (rollout::Result<serde_json::Value>, i32) {
    crate::tty::status("rollout is working...");

    match command {
        crate::Commands::Release(args) => dispatch!(args, global, release),
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Db(args) => dispatch!(args, global, db),
        crate::Commands::Drupal(args) => dispatch!(args, global, drupal),
        crate::Commands::Git(args) => dispatch!(args, global, git),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}
