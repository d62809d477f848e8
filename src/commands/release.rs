use clap::{Args, Subcommand};
use serde::Serialize;

use rollout::lock::{self, DeployLock};
use rollout::releases::{CleanupReport, Release, ReleaseManager, RollbackReport, SharedLink};
use rollout::template::TemplateVars;

use super::{CmdResult, Target, TargetArgs};

#[derive(Args)]
pub struct ReleaseArgs {
    #[command(subcommand)]
    command: ReleaseCommand,
}

#[derive(Subcommand)]
enum ReleaseCommand {
    /// Extract a tag from the repository into a new release directory
    Create {
        #[command(flatten)]
        target: TargetArgs,
        /// Release directory name
        release_name: String,
        /// Tag (or any commit-ish) to extract
        #[arg(long)]
        tag: String,
    },
    /// Link the configured shared files into a release
    Link {
        #[command(flatten)]
        target: TargetArgs,
        release_name: String,
    },
    /// Point `current` at a release
    Activate {
        #[command(flatten)]
        target: TargetArgs,
        release_name: String,
    },
    /// Remove old releases, keeping the newest ones and the current one
    Clean {
        #[command(flatten)]
        target: TargetArgs,
        /// Number of releases to keep (defaults to keepReleases)
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Mark the newest release as failed
    Invalidate {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List releases with their state
    List {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show one release and its state
    Show {
        #[command(flatten)]
        target: TargetArgs,
        release_name: String,
    },
    /// Show the current release and installed version
    Current {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Activate the release before the current one
    Rollback {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Delete invalidated releases
    PruneFailed {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Overwrite the VERSION file
    SetVersion {
        #[command(flatten)]
        target: TargetArgs,
        version: String,
    },
    /// Remove a stale deploy lock
    Unlock {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum ReleaseOutput {
    #[serde(rename = "release.create")]
    Create { release: Release },
    #[serde(rename = "release.link")]
    Link {
        release: String,
        links: Vec<SharedLink>,
    },
    #[serde(rename = "release.activate")]
    Activate { release: Release },
    #[serde(rename = "release.clean")]
    Clean { cleanup: CleanupReport },
    #[serde(rename = "release.invalidate")]
    Invalidate { invalidated: String },
    #[serde(rename = "release.list")]
    List {
        releases: Vec<Release>,
        current: Option<String>,
    },
    #[serde(rename = "release.show")]
    Show { release: Release },
    #[serde(rename = "release.current")]
    Current {
        current: Option<String>,
        version: Option<String>,
    },
    #[serde(rename = "release.rollback")]
    Rollback { rollback: RollbackReport },
    #[serde(rename = "release.prune_failed")]
    PruneFailed { cleanup: CleanupReport },
    #[serde(rename = "release.set_version")]
    SetVersion { version: String },
    #[serde(rename = "release.unlock")]
    Unlock {
        unlocked: bool,
        #[serde(rename = "lockPath")]
        lock_path: String,
    },
}

pub fn run(args: ReleaseArgs, global: &crate::commands::GlobalArgs) -> CmdResult<ReleaseOutput> {
    let (target_args, release_name, tag) = match &args.command {
        ReleaseCommand::Create {
            target,
            release_name,
            tag,
        } => (target, Some(release_name.as_str()), Some(tag.as_str())),
        ReleaseCommand::Link {
            target,
            release_name,
        }
        | ReleaseCommand::Activate {
            target,
            release_name,
        }
        | ReleaseCommand::Show {
            target,
            release_name,
        } => (target, Some(release_name.as_str()), None),
        ReleaseCommand::Clean { target, .. }
        | ReleaseCommand::Invalidate { target }
        | ReleaseCommand::List { target }
        | ReleaseCommand::Current { target }
        | ReleaseCommand::Rollback { target }
        | ReleaseCommand::PruneFailed { target }
        | ReleaseCommand::SetVersion { target, .. }
        | ReleaseCommand::Unlock { target } => (target, None, None),
    };

    let target = Target::resolve(target_args, global)?;
    let layout = target.config.layout();

    let mut vars = target.config.template_vars();
    if let Some(name) = release_name {
        vars.insert(TemplateVars::RELEASE_NAME.to_string(), name.to_string());
        vars.insert(TemplateVars::RELEASE_PATH.to_string(), layout.release_path(name));
    }
    if let Some(tag) = tag {
        vars.insert(TemplateVars::TAG.to_string(), tag.to_string());
    }

    let signals = target.signals(&vars);
    let manager = ReleaseManager::new(target.executor(), &signals, layout);

    let output = match args.command {
        ReleaseCommand::Create {
            release_name, tag, ..
        } => ReleaseOutput::Create {
            release: manager.create_release(&release_name, &tag)?,
        },
        ReleaseCommand::Link { release_name, .. } => ReleaseOutput::Link {
            links: manager.link_shared_files(&release_name, &target.config.shared_files)?,
            release: release_name,
        },
        ReleaseCommand::Activate { release_name, .. } => ReleaseOutput::Activate {
            release: manager.activate_release(&release_name)?,
        },
        ReleaseCommand::Clean { keep, .. } => ReleaseOutput::Clean {
            cleanup: manager.clean_old_releases(keep.unwrap_or(target.config.keep_releases))?,
        },
        ReleaseCommand::Invalidate { .. } => ReleaseOutput::Invalidate {
            invalidated: manager.invalidate_last_release()?,
        },
        ReleaseCommand::List { .. } => ReleaseOutput::List {
            releases: manager.list(),
            current: manager.current_release(),
        },
        ReleaseCommand::Show { release_name, .. } => ReleaseOutput::Show {
            release: manager.release(&release_name)?,
        },
        ReleaseCommand::Current { .. } => ReleaseOutput::Current {
            current: manager.current_release(),
            version: manager.get_currently_installed_version(),
        },
        ReleaseCommand::Rollback { .. } => ReleaseOutput::Rollback {
            rollback: manager.rollback()?,
        },
        ReleaseCommand::PruneFailed { .. } => ReleaseOutput::PruneFailed {
            cleanup: manager.prune_failed_releases()?,
        },
        ReleaseCommand::SetVersion { version, .. } => {
            manager.update_version_file(&version)?;
            ReleaseOutput::SetVersion { version }
        }
        ReleaseCommand::Unlock { .. } => {
            let releases_root = &manager.layout().releases_root;
            ReleaseOutput::Unlock {
                unlocked: DeployLock::force_unlock(target.executor(), releases_root)?,
                lock_path: lock::lock_path(releases_root),
            }
        }
    };

    // Partial cleanups still print their report but exit non-zero.
    let exit_code = match &output {
        ReleaseOutput::Clean { cleanup } | ReleaseOutput::PruneFailed { cleanup }
            if !cleanup.all_succeeded() =>
        {
            20
        }
        _ => 0,
    };

    Ok((output, exit_code))
}
