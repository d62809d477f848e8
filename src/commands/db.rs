use clap::{Args, Subcommand};
use serde::Serialize;

use rollout::db::{self, DbResult, DumpOptions};

use super::{CmdResult, Target, TargetArgs};

#[derive(Args)]
pub struct DbArgs {
    #[command(subcommand)]
    command: DbCommand,
}

#[derive(Subcommand)]
enum DbCommand {
    /// Dump the environment's database to a file on its host
    Dump {
        #[command(flatten)]
        target: TargetArgs,
        /// Backup file path on the deploy host
        path: String,
    },
    /// Restore the environment's database from a file on its host
    Restore {
        #[command(flatten)]
        target: TargetArgs,
        /// Backup file path on the deploy host
        path: String,
    },
}

#[derive(Serialize)]
pub struct DbOutput {
    pub command: String,
    #[serde(flatten)]
    pub result: DbResult,
}

pub fn run(args: DbArgs, global: &crate::commands::GlobalArgs) -> CmdResult<DbOutput> {
    let (command, target_args, path) = match &args.command {
        DbCommand::Dump { target, path } => ("db.dump", target, path),
        DbCommand::Restore { target, path } => ("db.restore", target, path),
    };

    let target = Target::resolve(target_args, global)?;
    let database = target.config.require_database()?;

    let mut options = DumpOptions::from_config(database);
    if options.password.is_none() && db::needs_password(database.engine, &options) {
        let password = prompt_password(&options)?;
        options = options.with_password(password);
    }

    let result = match &args.command {
        DbCommand::Dump { .. } => db::dump(target.executor(), database.engine, &options, path)?,
        DbCommand::Restore { .. } => {
            db::restore(target.executor(), database.engine, &options, path)?
        }
    };

    Ok((
        DbOutput {
            command: command.to_string(),
            result,
        },
        0,
    ))
}

fn prompt_password(options: &DumpOptions) -> rollout::Result<String> {
    if !crate::tty::is_stdin_tty() {
        return Err(rollout::Error::validation_missing_argument(vec![
            "database.password".to_string(),
        ])
        .with_hint("Set database.password in the config file or run from a terminal"));
    }

    crate::tty::prompt_password(&format!(
        "Enter database password for {}: ",
        options.user.as_deref().unwrap_or(&options.database)
    ))
}
