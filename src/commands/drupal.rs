use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use rollout::drupal::{Drupal, ModuleChanges};
use rollout::shell::quote_args;

use super::{CmdResult, Target, TargetArgs};

#[derive(Args)]
pub struct DrupalArgs {
    #[command(subcommand)]
    command: DrupalCommand,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum DrupalCommand {
    /// Run a drush command in the Drupal root (always with -y)
    Drush {
        #[command(flatten)]
        target: TargetArgs,
        /// Drush command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Enable/disable modules according to the modules.enabled/disabled files
    Modules {
        #[command(flatten)]
        target: TargetArgs,
        /// Multisite name: also apply modules.<name>.enabled/disabled
        #[arg(long)]
        multisite: Option<String>,
    },
    /// Turn maintenance mode on or off
    Maintenance {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Clear all Drupal caches
    CacheClear {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum DrupalOutput {
    #[serde(rename = "drupal.drush")]
    Drush { stdout: String },
    #[serde(rename = "drupal.modules")]
    Modules { changes: ModuleChanges },
    #[serde(rename = "drupal.maintenance")]
    Maintenance { enabled: bool },
    #[serde(rename = "drupal.cache_clear")]
    CacheClear {},
}

pub fn run(args: DrupalArgs, global: &crate::commands::GlobalArgs) -> CmdResult<DrupalOutput> {
    let target_args = match &args.command {
        DrupalCommand::Drush { target, .. }
        | DrupalCommand::Modules { target, .. }
        | DrupalCommand::Maintenance { target, .. }
        | DrupalCommand::CacheClear { target } => target,
    };

    let target = Target::resolve(target_args, global)?;
    let drupal = Drupal::from_config(target.executor(), &target.config)?;

    let output = match args.command {
        DrupalCommand::Drush { args, .. } => DrupalOutput::Drush {
            stdout: drupal.drush(&quote_args(&args))?,
        },
        DrupalCommand::Modules { multisite, .. } => DrupalOutput::Modules {
            changes: drupal.enable_disable_modules(multisite.as_deref())?,
        },
        DrupalCommand::Maintenance { state, .. } => {
            let enabled = matches!(state, Toggle::On);
            drupal.set_maintenance_mode(enabled)?;
            DrupalOutput::Maintenance { enabled }
        }
        DrupalCommand::CacheClear { .. } => {
            drupal.clear_cache()?;
            DrupalOutput::CacheClear {}
        }
    };

    Ok((output, 0))
}
