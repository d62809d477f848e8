//! Capistrano-style release directories.
//!
//! ```text
//! current -> releases/20140830180015_1.2.3   symlink to the active release
//! releases/
//!     20140830151210_1.2.2/
//!     20140830180015_1.2.3/
//!     20140829101500_1.2.1_failed/           invalidated, kept for inspection
//! repository.git/                            source repository, addressed by tag
//! shared/                                    files shared by every release
//!     config.yml
//!     media/
//! VERSION                                    tag of the active release
//! ```
//!
//! Every switch of a symlink (`current`, shared links) is done by creating
//! the new link under a unique temporary name next to the final one and
//! renaming it over the final name, so readers never see the link missing.

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::executor::{Executor, RunOptions};
use crate::signals::{operations, SignalBus};
use crate::utils::shell::{join_path, quote_arg, quote_path, split_parent};

pub const FAILED_RELEASE_SUFFIX: &str = "_failed";
pub const CURRENT_LINK: &str = "current";
pub const VERSION_FILE: &str = "VERSION";
/// Written into each release: the tag it was extracted from.
pub const REVISION_FILE: &str = "REVISION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseLayout {
    pub project_root: String,
    pub releases_root: String,
    pub shared_root: String,
    pub repository_root: String,
}

impl ReleaseLayout {
    /// Default layout: `releases/`, `shared/` and `repository.git` inside the project root.
    pub fn from_project_root(project_root: &str) -> Self {
        let project_root = project_root.trim_end_matches('/').to_string();
        Self {
            releases_root: join_path(&project_root, "releases"),
            shared_root: join_path(&project_root, "shared"),
            repository_root: join_path(&project_root, "repository.git"),
            project_root,
        }
    }

    pub fn release_path(&self, release_name: &str) -> String {
        join_path(&self.releases_root, release_name)
    }

    pub fn current_link(&self) -> String {
        join_path(&self.project_root, CURRENT_LINK)
    }

    pub fn version_file(&self) -> String {
        join_path(&self.project_root, VERSION_FILE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    Provisioned,
    Activated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub name: String,
    pub path: String,
    pub state: ReleaseState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedLink {
    pub target: String,
    pub link: String,
}

/// Outcome of a best-effort removal pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
    pub kept: Vec<String>,
    /// Release spared because `current` points at it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected: Option<String>,
}

impl CleanupReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

static RELEASE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]*$").unwrap());

/// Release names must be plain directory names that sort and never look invalidated.
pub fn validate_release_name(release_name: &str) -> Result<()> {
    if !RELEASE_NAME_PATTERN.is_match(release_name) {
        return Err(Error::validation_invalid_argument(
            "release_name",
            "Release names may only contain letters, digits, '.', '_', '+' and '-', and must not start with a symbol",
            Some(release_name.to_string()),
            None,
        ));
    }

    if release_name.ends_with(FAILED_RELEASE_SUFFIX) {
        return Err(Error::validation_invalid_argument(
            "release_name",
            format!("Release names cannot end with '{}'", FAILED_RELEASE_SUFFIX),
            Some(release_name.to_string()),
            None,
        ));
    }

    Ok(())
}

fn validate_tag(tag: &str) -> Result<()> {
    if tag.trim().is_empty() || tag.starts_with('-') || tag.chars().any(char::is_whitespace) {
        return Err(Error::validation_invalid_argument(
            "tag",
            "Tag must be a non-empty git revision without whitespace",
            Some(tag.to_string()),
            None,
        ));
    }
    Ok(())
}

/// `<YYYYmmddHHMMSS>_<tag>`, with characters unsafe in a directory name replaced.
pub fn generate_release_name(tag: &str, timestamp: NaiveDateTime) -> String {
    let safe_tag: String = tag
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}_{}", timestamp.format("%Y%m%d%H%M%S"), safe_tag)
}

/// Version embedded in a conventional release name (`20240101120000_1.2.3` -> `1.2.3`).
pub fn release_version(release_name: &str) -> Option<&str> {
    let name = release_name
        .strip_suffix(FAILED_RELEASE_SUFFIX)
        .unwrap_or(release_name);
    name.split_once('_')
        .map(|(_, version)| version)
        .filter(|version| !version.is_empty())
}

/// Owns the release directory layout and its lifecycle.
pub struct ReleaseManager<'a> {
    executor: &'a dyn Executor,
    signals: &'a SignalBus<'a>,
    layout: ReleaseLayout,
}

impl<'a> ReleaseManager<'a> {
    pub fn new(executor: &'a dyn Executor, signals: &'a SignalBus<'a>, layout: ReleaseLayout) -> Self {
        Self {
            executor,
            signals,
            layout,
        }
    }

    pub fn layout(&self) -> &ReleaseLayout {
        &self.layout
    }

    pub fn release_path(&self, release_name: &str) -> String {
        self.layout.release_path(release_name)
    }

    /// Create `releases_root/<release_name>` and extract `tag` into it.
    ///
    /// The archive is streamed from `git archive` straight into `tar`; no
    /// intermediate file is written. On failure the partial directory is
    /// removed and `current` is left untouched.
    pub fn create_release(&self, release_name: &str, tag: &str) -> Result<Release> {
        validate_release_name(release_name)?;
        validate_tag(tag)?;

        self.signals.register(operations::CREATE_RELEASE, || {
            let path = self.release_path(release_name);
            let repository = quote_path(&self.layout.repository_root);

            if self.executor.path_exists(&path) {
                return Err(Error::release_creation_failed(
                    release_name,
                    &path,
                    "Release directory already exists",
                    None,
                ));
            }

            let verify = self.executor.run_quiet(&format!(
                "git -C {} rev-parse --verify --quiet {}",
                repository,
                quote_arg(&format!("{}^{{commit}}", tag))
            ));
            if !verify.success {
                return Err(Error::release_creation_failed(
                    release_name,
                    &path,
                    format!(
                        "Tag '{}' does not resolve in {}",
                        tag, self.layout.repository_root
                    ),
                    Some(verify.error_text().to_string()),
                ));
            }

            // Plain `mkdir` on the release itself so a concurrent creator loses.
            let mkdir = self.executor.execute(
                &format!(
                    "mkdir -p {} && mkdir {}",
                    quote_path(&self.layout.releases_root),
                    quote_path(&path)
                ),
                &RunOptions::default(),
            );
            if !mkdir.success {
                return Err(Error::release_creation_failed(
                    release_name,
                    &path,
                    "Could not create release directory",
                    Some(mkdir.error_text().to_string()),
                ));
            }

            let extract = self.executor.execute(
                &format!(
                    "git -C {} archive --format=tar {} | tar -x -f - -C {} && printf '%s\\n' {} > {}",
                    repository,
                    quote_arg(tag),
                    quote_path(&path),
                    quote_path(tag),
                    quote_path(&join_path(&path, REVISION_FILE))
                ),
                &RunOptions::default(),
            );
            if !extract.success {
                let cleanup = self
                    .executor
                    .run_quiet(&format!("rm -rf {}", quote_path(&path)));
                if !cleanup.success {
                    log_status!("release", "Could not remove partial release {}", path);
                }
                return Err(Error::release_creation_failed(
                    release_name,
                    &path,
                    "Archive extraction failed",
                    Some(extract.error_text().to_string()),
                ));
            }

            log_status!("release", "Created {} from {}", release_name, tag);
            Ok(Release {
                name: release_name.to_string(),
                path,
                state: ReleaseState::Provisioned,
            })
        })
    }

    /// Link every `target -> link_name` pair of `shared_files` into the release.
    ///
    /// Stops at the first failure; links created before it are kept.
    pub fn link_shared_files(
        &self,
        release_name: &str,
        shared_files: &BTreeMap<String, String>,
    ) -> Result<Vec<SharedLink>> {
        validate_release_name(release_name)?;

        self.signals.register(operations::LINK_SHARED_FILES, || {
            let release_path = self.release_path(release_name);
            if !self.executor.is_dir(&release_path) {
                return Err(Error::release_not_found(release_name, &release_path));
            }

            let mut links = Vec::with_capacity(shared_files.len());
            for (target, link_name) in shared_files {
                let target_path = join_path(&self.layout.shared_root, target);
                let link_path = join_path(&release_path, link_name);

                if !self.executor.path_exists(&target_path) {
                    return Err(Error::release_link_failed(
                        release_name,
                        &target_path,
                        &link_path,
                        "Shared target does not exist",
                        None,
                    ));
                }

                self.swap_symlink(&target_path, &link_path)
                    .map_err(|stderr| {
                        Error::release_link_failed(
                            release_name,
                            &target_path,
                            &link_path,
                            "Could not replace link",
                            Some(stderr),
                        )
                    })?;

                links.push(SharedLink {
                    target: target_path,
                    link: link_path,
                });
            }

            log_status!(
                "release",
                "Linked {} shared file(s) into {}",
                links.len(),
                release_name
            );
            Ok(links)
        })
    }

    /// Point `current` at the release. Re-activating the active release is harmless.
    pub fn activate_release(&self, release_name: &str) -> Result<Release> {
        validate_release_name(release_name)?;

        self.signals.register(operations::ACTIVATE_RELEASE, || {
            let path = self.release_path(release_name);
            if !self.executor.is_dir(&path) {
                return Err(Error::release_not_found(release_name, &path));
            }

            self.swap_symlink(&path, &self.layout.current_link())
                .map_err(|stderr| {
                    Error::release_activation_failed(
                        release_name,
                        &path,
                        "Could not switch current link",
                        Some(stderr),
                    )
                })?;

            log_status!("release", "Activated {}", release_name);
            Ok(Release {
                name: release_name.to_string(),
                path,
                state: ReleaseState::Activated,
            })
        })
    }

    /// Remove all but the newest `keep` releases, never the current one.
    ///
    /// Every candidate is attempted; failures are collected in the report.
    pub fn clean_old_releases(&self, keep: usize) -> Result<CleanupReport> {
        self.signals.register(operations::CLEAN_OLD_RELEASES, || {
            let releases = self.get_releases();
            let current = self.current_release();
            let cutoff = releases.len().saturating_sub(keep);
            let (old, newest) = releases.split_at(cutoff);

            let mut report = CleanupReport {
                kept: newest.to_vec(),
                ..CleanupReport::default()
            };

            for release_name in old {
                if current.as_deref() == Some(release_name.as_str()) {
                    report.protected = Some(release_name.clone());
                    continue;
                }

                let path = self.release_path(release_name);
                let output = self
                    .executor
                    .execute(&format!("rm -rf {}", quote_path(&path)), &RunOptions::default());
                if output.success {
                    report.removed.push(release_name.clone());
                } else {
                    log_status!(
                        "release",
                        "Failed to remove {} (exit {})",
                        release_name,
                        output.exit_code
                    );
                    report.failed.push(release_name.clone());
                }
            }

            Ok(report)
        })
    }

    /// Rename the newest release with the failed suffix so it is never a
    /// rollback target. Its files stay on disk. Returns the new directory name.
    pub fn invalidate_last_release(&self) -> Result<String> {
        self.signals.register(operations::INVALIDATE_LAST_RELEASE, || {
            let releases = self.get_releases();
            let Some(last) = releases.last() else {
                return Err(Error::release_none(&self.layout.releases_root));
            };

            if self.current_release().as_deref() == Some(last.as_str()) {
                return Err(Error::release_active(last));
            }

            let failed_name = self.unused_failed_name(last);
            self.executor.run(&format!(
                "mv -T {} {}",
                quote_path(&self.release_path(last)),
                quote_path(&self.release_path(&failed_name))
            ))?;

            log_status!("release", "Invalidated {}", last);
            Ok(failed_name)
        })
    }

    /// `<name>_failed`, or `<name>_<n>_failed` when earlier attempts at the
    /// same name were already invalidated.
    fn unused_failed_name(&self, release_name: &str) -> String {
        let mut candidate = format!("{}{}", release_name, FAILED_RELEASE_SUFFIX);
        let mut attempt = 2;
        while self.executor.path_exists(&self.release_path(&candidate)) {
            candidate = format!("{}_{}{}", release_name, attempt, FAILED_RELEASE_SUFFIX);
            attempt += 1;
        }
        candidate
    }

    /// Release names, oldest first. Empty when the releases directory is
    /// missing or empty.
    pub fn get_releases(&self) -> Vec<String> {
        let mut releases: Vec<String> = self
            .executor
            .list_dir(&self.layout.releases_root)
            .into_iter()
            .filter(|name| !name.starts_with('.') && !name.ends_with(FAILED_RELEASE_SUFFIX))
            .collect();
        releases.sort();
        releases
    }

    /// Names of invalidated releases still on disk, sorted.
    pub fn get_failed_releases(&self) -> Vec<String> {
        let mut failed: Vec<String> = self
            .executor
            .list_dir(&self.layout.releases_root)
            .into_iter()
            .filter(|name| !name.starts_with('.') && name.ends_with(FAILED_RELEASE_SUFFIX))
            .collect();
        failed.sort();
        failed
    }

    /// Every release on disk with its state, failed ones included.
    pub fn list(&self) -> Vec<Release> {
        let current = self.current_release();
        let mut releases: Vec<Release> = self
            .get_releases()
            .into_iter()
            .map(|name| {
                let state = if current.as_deref() == Some(name.as_str()) {
                    ReleaseState::Activated
                } else {
                    ReleaseState::Provisioned
                };
                Release {
                    path: self.release_path(&name),
                    name,
                    state,
                }
            })
            .chain(self.get_failed_releases().into_iter().map(|name| Release {
                path: self.release_path(&name),
                name,
                state: ReleaseState::Failed,
            }))
            .collect();
        releases.sort_by(|a, b| a.name.cmp(&b.name));
        releases
    }

    /// A single release by name, failed ones included.
    pub fn release(&self, release_name: &str) -> Result<Release> {
        self.list()
            .into_iter()
            .find(|release| release.name == release_name)
            .ok_or_else(|| Error::release_not_found(release_name, self.release_path(release_name)))
    }

    /// Name of the release `current` points at, if any.
    pub fn current_release(&self) -> Option<String> {
        let target = self.executor.read_link(&self.layout.current_link())?;
        let (_, name) = split_parent(&target);
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Trimmed contents of the VERSION file, or `None` on a fresh install.
    pub fn get_currently_installed_version(&self) -> Option<String> {
        let project = self.executor.in_dir(self.layout.project_root.clone());
        let output = project.run_quiet(&format!("cat {}", VERSION_FILE));
        if !output.success {
            return None;
        }

        let version = output.stdout.trim();
        if version.is_empty() {
            None
        } else {
            Some(version.to_string())
        }
    }

    /// Replace the VERSION file with `version`.
    ///
    /// Not transactional with [`activate_release`](Self::activate_release): a
    /// crash between the two leaves VERSION describing the previous release.
    pub fn update_version_file(&self, version: &str) -> Result<()> {
        if version.is_empty() || version != version.trim() || version.contains(['\n', '\r']) {
            return Err(Error::validation_invalid_argument(
                "version",
                "Version must be a single line without surrounding whitespace",
                Some(version.to_string()),
                None,
            ));
        }

        self.signals.register(operations::UPDATE_VERSION_FILE, || {
            let target = self.layout.version_file();
            let tmp = join_path(
                &self.layout.project_root,
                &format!(".{}.{}", VERSION_FILE, Uuid::new_v4().simple()),
            );

            let output = self.executor.execute(
                &format!(
                    "printf '%s\\n' {} > {} && mv -f {} {}",
                    quote_path(version),
                    quote_path(&tmp),
                    quote_path(&tmp),
                    quote_path(&target)
                ),
                &RunOptions::quiet(),
            );
            if !output.success {
                self.executor.run_quiet(&format!("rm -f {}", quote_path(&tmp)));
                return Err(Error::internal_io(
                    output.error_text().to_string(),
                    Some(format!("write {}", target)),
                ));
            }

            Ok(())
        })
    }

    /// Activate the release preceding the current one.
    ///
    /// VERSION is set to the target's recorded revision, falling back to the
    /// version in its name. It is left alone when neither is known.
    pub fn rollback(&self) -> Result<RollbackReport> {
        self.signals.register(operations::ROLLBACK, || {
            let Some(current) = self.current_release() else {
                return Err(Error::release_none(&self.layout.releases_root)
                    .with_hint("No release is currently active"));
            };

            let releases = self.get_releases();
            let Some(previous) = releases
                .iter()
                .filter(|name| name.as_str() < current.as_str())
                .next_back()
                .cloned()
            else {
                return Err(Error::release_none(&self.layout.releases_root)
                    .with_hint(format!("No release older than '{}' to roll back to", current)));
            };

            self.activate_release(&previous)?;

            let version = self
                .revision(&previous)
                .or_else(|| release_version(&previous).map(str::to_string));
            if let Some(version) = &version {
                self.update_version_file(version)?;
            }

            log_status!("release", "Rolled back from {} to {}", current, previous);
            Ok(RollbackReport {
                from: current,
                to: previous,
                version,
            })
        })
    }

    /// Tag recorded in the release's REVISION file.
    pub fn revision(&self, release_name: &str) -> Option<String> {
        let file = join_path(&self.release_path(release_name), REVISION_FILE);
        let output = self.executor.run_quiet(&format!("cat {}", quote_path(&file)));
        if !output.success {
            return None;
        }
        let revision = output.stdout.trim();
        (!revision.is_empty()).then(|| revision.to_string())
    }

    /// Delete every invalidated release directory.
    pub fn prune_failed_releases(&self) -> Result<CleanupReport> {
        self.signals.register(operations::PRUNE_FAILED_RELEASES, || {
            let mut report = CleanupReport {
                kept: self.get_releases(),
                ..CleanupReport::default()
            };

            for failed in self.get_failed_releases() {
                let output = self.executor.execute(
                    &format!("rm -rf {}", quote_path(&self.release_path(&failed))),
                    &RunOptions::default(),
                );
                if output.success {
                    report.removed.push(failed);
                } else {
                    report.failed.push(failed);
                }
            }

            Ok(report)
        })
    }

    /// Atomically make `link_path` a symlink to `target`.
    ///
    /// The link is built under a unique hidden name in the same directory and
    /// renamed over `link_path`. Returns the command's error text on failure.
    fn swap_symlink(&self, target: &str, link_path: &str) -> std::result::Result<(), String> {
        let (parent, name) = split_parent(link_path);
        let tmp = join_path(parent, &format!(".{}.{}", name, Uuid::new_v4().simple()));

        let output = self.executor.execute(
            &format!(
                "mkdir -p {parent} && ln -s {target} {tmp} && mv -Tf {tmp} {link}",
                parent = quote_path(parent),
                target = quote_path(target),
                tmp = quote_path(&tmp),
                link = quote_path(link_path),
            ),
            &RunOptions::default(),
        );

        if output.success {
            return Ok(());
        }

        self.executor.run_quiet(&format!("rm -f {}", quote_path(&tmp)));
        Err(output.error_text().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::CommandOutput;
    use crate::testing::ScriptedExecutor;
    use chrono::NaiveDate;

    #[test]
    fn layout_defaults_follow_project_root() {
        let layout = ReleaseLayout::from_project_root("/var/www/app/");
        assert_eq!(layout.project_root, "/var/www/app");
        assert_eq!(layout.releases_root, "/var/www/app/releases");
        assert_eq!(layout.shared_root, "/var/www/app/shared");
        assert_eq!(layout.repository_root, "/var/www/app/repository.git");
        assert_eq!(layout.current_link(), "/var/www/app/current");
        assert_eq!(layout.version_file(), "/var/www/app/VERSION");
        assert_eq!(layout.release_path("r1"), "/var/www/app/releases/r1");
    }

    #[test]
    fn generated_names_sort_by_time() {
        let earlier = NaiveDate::from_ymd_opt(2014, 8, 30)
            .unwrap()
            .and_hms_opt(15, 12, 10)
            .unwrap();
        let later = NaiveDate::from_ymd_opt(2014, 8, 30)
            .unwrap()
            .and_hms_opt(18, 0, 15)
            .unwrap();

        let a = generate_release_name("1.2.3", later);
        let b = generate_release_name("1.10.0", earlier);
        assert_eq!(a, "20140830180015_1.2.3");
        assert!(b < a);
    }

    #[test]
    fn generated_names_sanitize_tags() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let name = generate_release_name("release/v2 beta", ts);
        assert_eq!(name, "20240101000000_release-v2-beta");
        assert!(validate_release_name(&name).is_ok());
    }

    #[test]
    fn release_version_is_suffix_after_timestamp() {
        assert_eq!(release_version("20240101_1.0"), Some("1.0"));
        assert_eq!(release_version("20240101120000_1.2.3_failed"), Some("1.2.3"));
        assert_eq!(release_version("20240101"), None);
        assert_eq!(release_version("20240101_"), None);
    }

    #[test]
    fn release_name_validation() {
        assert!(validate_release_name("20240101_1.0").is_ok());
        assert!(validate_release_name("").is_err());
        assert!(validate_release_name("../etc").is_err());
        assert!(validate_release_name("a/b").is_err());
        assert!(validate_release_name(".hidden").is_err());
        assert!(validate_release_name("r1_failed").is_err());
    }

    #[test]
    fn tag_validation() {
        assert!(validate_tag("1.2.3").is_ok());
        assert!(validate_tag("--output=/tmp/x").is_err());
        assert!(validate_tag("a b").is_err());
        assert!(validate_tag("").is_err());
    }

    #[test]
    fn releases_are_sorted_and_filtered_whatever_the_listing_order() {
        let executor = ScriptedExecutor::new().respond(
            "ls -1 '/srv/app/releases'",
            CommandOutput::ok(
                "20240301_1.2\n.deploy.lock\n20240101_1.0\n20240201_1.1_failed\n20240115_1.0.1\n",
            ),
        );
        let bus = SignalBus::new();
        let manager =
            ReleaseManager::new(&executor, &bus, ReleaseLayout::from_project_root("/srv/app"));

        assert_eq!(
            manager.get_releases(),
            vec!["20240101_1.0", "20240115_1.0.1", "20240301_1.2"]
        );
        assert_eq!(manager.get_failed_releases(), vec!["20240201_1.1_failed"]);
    }
}
