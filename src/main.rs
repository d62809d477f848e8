use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{config, db, deploy, drupal, git, release};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "rollout")]
#[command(version = VERSION)]
#[command(about = "Release-directory deployments over SSH")]
struct Cli {
    /// Config file (default: $ROLLOUT_CONFIG, ./rollout.json, ~/.config/rollout/rollout.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage release directories on a deploy host
    Release(release::ReleaseArgs),
    /// Deploy a tag: create, link, activate and clean up
    Deploy(deploy::DeployArgs),
    /// Database dumps and restores
    Db(db::DbArgs),
    /// Drush helpers for Drupal sites
    Drupal(drupal::DrupalArgs),
    /// Git helpers
    Git(git::GitArgs),
    /// Inspect configuration
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs { config: cli.config };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err);
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
