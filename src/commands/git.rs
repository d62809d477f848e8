use clap::{Args, Subcommand};
use serde::Serialize;

use rollout::executor::LocalExecutor;
use rollout::vcs::Repository;

use super::{CmdResult, Target, TargetArgs};

#[derive(Args)]
pub struct GitArgs {
    #[command(subcommand)]
    command: GitCommand,
}

#[derive(Subcommand)]
enum GitCommand {
    /// Most recent tag reachable from a commit
    LatestTag {
        /// Commit to describe (default HEAD)
        #[arg(long)]
        commit: Option<String>,
        /// Local repository path
        #[arg(long, default_value = ".")]
        repo: String,
    },
    /// Hash of HEAD
    LatestCommit {
        #[arg(long, default_value = ".")]
        repo: String,
    },
    /// Push a tag to a remote
    PushTag {
        tag: String,
        #[arg(long, default_value = "origin")]
        remote: String,
        #[arg(long, default_value = ".")]
        repo: String,
    },
    /// One-line commit messages between two revisions, oldest first
    Log {
        first: String,
        #[arg(default_value = "HEAD")]
        last: String,
        #[arg(long, default_value = ".")]
        repo: String,
    },
    /// Fetch, check out a tag and update submodules in the environment's repository
    UpdateRepo {
        #[command(flatten)]
        target: TargetArgs,
        tag: String,
    },
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum GitOutput {
    #[serde(rename = "git.latest_tag")]
    LatestTag { tag: Option<String> },
    #[serde(rename = "git.latest_commit")]
    LatestCommit { commit: String },
    #[serde(rename = "git.push_tag")]
    PushTag { tag: String, remote: String },
    #[serde(rename = "git.log")]
    Log { commits: Vec<String> },
    #[serde(rename = "git.update_repo")]
    UpdateRepo { repository: String, tag: String },
}

pub fn run(args: GitArgs, global: &crate::commands::GlobalArgs) -> CmdResult<GitOutput> {
    let local = LocalExecutor::new();

    let output = match args.command {
        GitCommand::LatestTag { commit, repo } => GitOutput::LatestTag {
            tag: Repository::open(&local, repo).latest_tag(commit.as_deref())?,
        },
        GitCommand::LatestCommit { repo } => GitOutput::LatestCommit {
            commit: Repository::open(&local, repo).latest_commit()?,
        },
        GitCommand::PushTag { tag, remote, repo } => {
            Repository::open(&local, repo).push_tag(&tag, &remote)?;
            GitOutput::PushTag { tag, remote }
        }
        GitCommand::Log { first, last, repo } => GitOutput::Log {
            commits: Repository::open(&local, repo).commit_messages(&first, &last)?,
        },
        GitCommand::UpdateRepo { target, tag } => {
            let target = Target::resolve(&target, global)?;
            let repository = target.config.repository_root.clone();
            Repository::open(target.executor(), repository.clone()).update_repository(&tag)?;
            GitOutput::UpdateRepo { repository, tag }
        }
    };

    Ok((output, 0))
}
