use serde::Serialize;
use std::collections::HashMap;

use crate::config::DeployConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::lock::{self, DeployLock};
use crate::releases::{
    generate_release_name, validate_release_name, CleanupReport, Release, ReleaseManager,
    SharedLink,
};
use crate::signals::{operations, SignalBus};
use crate::utils::shell::quote_path;
use crate::utils::template::TemplateVars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    pub tag: String,
    /// Explicit release directory name; generated from the tag and time when absent.
    pub release_name: Option<String>,
    /// Overrides the configured number of releases to keep.
    pub keep: Option<usize>,
}

impl DeployOptions {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            release_name: None,
            keep: None,
        }
    }

    /// The release name this deploy will use. Call once and pass the value
    /// back through `release_name` so hooks and the deploy agree.
    pub fn resolve_release_name(&self) -> String {
        self.release_name
            .clone()
            .unwrap_or_else(|| generate_release_name(&self.tag, chrono::Local::now().naive_local()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub site: String,
    pub environment: String,
    pub tag: String,
    pub release: Release,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_release: Option<String>,
    pub shared_links: Vec<SharedLink>,
    pub cleanup: CleanupReport,
}

/// Hook placeholders for a deploy: the config's variables plus the release
/// being deployed.
pub fn template_vars(config: &DeployConfig, release_name: &str, tag: &str) -> HashMap<String, String> {
    let mut vars = config.template_vars();
    vars.insert(TemplateVars::RELEASE_NAME.to_string(), release_name.to_string());
    vars.insert(
        TemplateVars::RELEASE_PATH.to_string(),
        config.layout().release_path(release_name),
    );
    vars.insert(TemplateVars::TAG.to_string(), tag.to_string());
    vars
}

/// Full deploy of `options.tag`: create, link, activate, record the version
/// and clean up old releases, all under the project's deploy lock.
pub fn deploy(
    executor: &dyn Executor,
    signals: &SignalBus<'_>,
    config: &DeployConfig,
    options: &DeployOptions,
) -> Result<DeployReport> {
    let release_name = options.resolve_release_name();
    validate_release_name(&release_name)?;
    let keep = options.keep.unwrap_or(config.keep_releases);

    signals.register(operations::DEPLOY, || {
        let layout = config.layout();
        executor.run(&format!(
            "mkdir -p {} {}",
            quote_path(&layout.releases_root),
            quote_path(&layout.shared_root)
        ))?;

        let lock = DeployLock::acquire(executor, &layout.releases_root, &lock::default_owner())?;
        let manager = ReleaseManager::new(executor, signals, layout);

        let outcome = run_steps(&manager, config, &release_name, &options.tag, keep);
        let released = lock.release();
        let report = outcome?;
        released?;
        Ok(report)
    })
}

fn run_steps(
    manager: &ReleaseManager<'_>,
    config: &DeployConfig,
    release_name: &str,
    tag: &str,
    keep: usize,
) -> Result<DeployReport> {
    let previous_release = manager.current_release();

    manager.create_release(release_name, tag)?;

    let staged = manager
        .link_shared_files(release_name, &config.shared_files)
        .and_then(|links| manager.activate_release(release_name).map(|release| (links, release)));
    let (shared_links, release) = match staged {
        Ok(staged) => staged,
        Err(err) => {
            abandon(manager, release_name);
            return Err(err);
        }
    };

    manager.update_version_file(tag)?;

    let cleanup = manager.clean_old_releases(keep)?;
    if !cleanup.all_succeeded() {
        log_status!(
            "deploy",
            "Could not remove {} old release(s): {}",
            cleanup.failed.len(),
            cleanup.failed.join(", ")
        );
    }

    log_status!(
        "deploy",
        "{} {}: {} is live",
        config.site,
        config.environment,
        release_name
    );

    Ok(DeployReport {
        site: config.site.clone(),
        environment: config.environment.clone(),
        tag: tag.to_string(),
        release,
        previous_release,
        shared_links,
        cleanup,
    })
}

/// Mark a release that never went live as failed. Best effort: the
/// original deploy error is what gets reported.
fn abandon(manager: &ReleaseManager<'_>, release_name: &str) {
    let newest = manager.get_releases().pop();
    if newest.as_deref() != Some(release_name) {
        log_status!(
            "deploy",
            "Left {} in place; it is not the newest release",
            release_name
        );
        return;
    }

    match manager.invalidate_last_release() {
        Ok(failed) => log_status!("deploy", "Invalidated unfinished release as {}", failed),
        Err(err) => log_status!("deploy", "Could not invalidate {}: {}", release_name, err.message),
    }
}
