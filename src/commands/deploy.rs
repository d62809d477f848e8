use clap::Args;

use rollout::deploy::{self, DeployOptions, DeployReport};

use super::{CmdResult, Target, TargetArgs};

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Tag to deploy
    #[arg(long)]
    tag: String,

    /// Release directory name (default: <timestamp>_<tag>)
    #[arg(long)]
    name: Option<String>,

    /// Number of releases to keep after the deploy
    #[arg(long)]
    keep: Option<usize>,
}

pub fn run(args: DeployArgs, global: &crate::commands::GlobalArgs) -> CmdResult<DeployReport> {
    let target = Target::resolve(&args.target, global)?;

    let mut options = DeployOptions {
        tag: args.tag,
        release_name: args.name,
        keep: args.keep,
    };
    let release_name = options.resolve_release_name();
    options.release_name = Some(release_name.clone());

    let vars = deploy::template_vars(&target.config, &release_name, &options.tag);
    let signals = target.signals(&vars);

    let report = deploy::deploy(target.executor(), &signals, &target.config, &options)?;
    let exit_code = if report.cleanup.all_succeeded() { 0 } else { 20 };

    Ok((report, exit_code))
}
