use clap::{Args, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;

use rollout::config::{self, ConfigFile, DeployConfig};

use super::{CmdResult, TargetArgs};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the resolved configuration for a site and environment
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List configured sites and their environments
    List,
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum ConfigOutput {
    #[serde(rename = "config.show")]
    Show { path: String, config: DeployConfig },
    #[serde(rename = "config.list")]
    List {
        path: String,
        sites: BTreeMap<String, Vec<String>>,
    },
}

pub fn run(args: ConfigArgs, global: &crate::commands::GlobalArgs) -> CmdResult<ConfigOutput> {
    let path = config::locate(global.config.as_deref())?;
    let file = ConfigFile::load(&path)?;
    let path = path.to_string_lossy().to_string();

    let output = match args.command {
        ConfigCommand::Show { target } => ConfigOutput::Show {
            config: file.resolve(&target.site, &target.environment)?,
            path,
        },
        ConfigCommand::List => ConfigOutput::List {
            sites: file
                .site_names()
                .into_iter()
                .map(|site| {
                    let environments = file.environment_names(&site);
                    (site, environments)
                })
                .collect(),
            path,
        },
    };

    Ok((output, 0))
}
