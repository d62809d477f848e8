//! Site/environment configuration.
//!
//! A config file holds shared `defaults` plus one settings object per
//! `sites.<site>.<environment>`:
//!
//! ```json
//! {
//!   "defaults": { "keepReleases": 5, "sharedFiles": { "config.yml": "config.yml" } },
//!   "sites": {
//!     "shop": {
//!       "prod": {
//!         "projectRoot": "/var/www/shop/prod",
//!         "server": { "host": "www.example.com", "user": "deploy" }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Resolving a site and environment deep-merges the environment settings
//! over the defaults and produces an immutable [`DeployConfig`]. Nothing
//! global is mutated; each invocation resolves its own value.

use crate::error::{Error, Result};
use crate::hooks::{HookFailureMode, HookMap};
use crate::paths;
use crate::releases::ReleaseLayout;
use crate::utils::shell::join_path;
use crate::utils::template::TemplateVars;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const DEFAULT_KEEP_RELEASES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
}

fn default_port() -> u16 {
    22
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Mysql,
    #[serde(alias = "pgsql", alias = "postgresql")]
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub engine: DatabaseEngine,
    pub name: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    /// Stored passwords are optional; the CLI prompts when one is needed.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// Raw, partially specified settings as they appear in the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DeploySettings {
    project_root: Option<String>,
    releases_root: Option<String>,
    shared_root: Option<String>,
    repository_root: Option<String>,
    drupal_root: Option<String>,
    #[serde(default)]
    shared_files: BTreeMap<String, String>,
    keep_releases: Option<usize>,
    server: Option<ServerConfig>,
    #[serde(default)]
    hooks: HookMap,
    hook_failure_mode: Option<HookFailureMode>,
    database: Option<DatabaseConfig>,
}

/// Fully resolved configuration for one site and environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    pub site: String,
    pub environment: String,
    pub project_root: String,
    pub releases_root: String,
    pub shared_root: String,
    pub repository_root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drupal_root: Option<String>,
    pub shared_files: BTreeMap<String, String>,
    pub keep_releases: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
    pub hooks: HookMap,
    pub hook_failure_mode: HookFailureMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
}

impl DeployConfig {
    pub fn layout(&self) -> ReleaseLayout {
        ReleaseLayout {
            project_root: self.project_root.clone(),
            releases_root: self.releases_root.clone(),
            shared_root: self.shared_root.clone(),
            repository_root: self.repository_root.clone(),
        }
    }

    /// Placeholders available to hook commands.
    pub fn template_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::with_capacity(8);
        vars.insert(TemplateVars::SITE.to_string(), self.site.clone());
        vars.insert(TemplateVars::ENVIRONMENT.to_string(), self.environment.clone());
        vars.insert(TemplateVars::PROJECT_ROOT.to_string(), self.project_root.clone());
        vars.insert(TemplateVars::RELEASES_ROOT.to_string(), self.releases_root.clone());
        vars.insert(TemplateVars::SHARED_ROOT.to_string(), self.shared_root.clone());
        vars.insert(
            TemplateVars::REPOSITORY_ROOT.to_string(),
            self.repository_root.clone(),
        );
        vars
    }

    pub fn require_drupal_root(&self) -> Result<&str> {
        self.drupal_root
            .as_deref()
            .ok_or_else(|| Error::config_missing_key("drupalRoot", None))
    }

    pub fn require_database(&self) -> Result<&DatabaseConfig> {
        self.database
            .as_ref()
            .ok_or_else(|| Error::config_missing_key("database", None))
    }
}

/// Parsed config file, before site/environment resolution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    defaults: Value,
    #[serde(default)]
    sites: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(skip)]
    path: Option<String>,
}

impl ConfigFile {
    pub fn parse(raw: &str, path: Option<&str>) -> Result<Self> {
        let mut file: ConfigFile = serde_json::from_str(raw).map_err(|e| {
            Error::config_invalid_json(path.unwrap_or("<inline>").to_string(), e)
        })?;
        file.path = path.map(str::to_string);
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;
        Self::parse(&raw, Some(path.to_string_lossy().as_ref()))
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn site_names(&self) -> Vec<String> {
        self.sites.keys().cloned().collect()
    }

    pub fn environment_names(&self, site: &str) -> Vec<String> {
        self.sites
            .get(site)
            .map(|envs| envs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolve one site/environment pair into an immutable config.
    pub fn resolve(&self, site: &str, environment: &str) -> Result<DeployConfig> {
        let envs = self
            .sites
            .get(site)
            .ok_or_else(|| Error::config_site_not_found(site, self.site_names()))?;
        let overlay = envs.get(environment).ok_or_else(|| {
            Error::config_environment_not_found(site, environment, self.environment_names(site))
        })?;

        let mut merged = match &self.defaults {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        merge_values(&mut merged, overlay.clone());

        let settings: DeploySettings = serde_json::from_value(merged).map_err(|e| {
            Error::config_invalid_value(
                format!("sites.{}.{}", site, environment),
                None,
                e.to_string(),
            )
        })?;

        resolve_settings(site, environment, settings, self.path.clone())
    }
}

fn resolve_settings(
    site: &str,
    environment: &str,
    settings: DeploySettings,
    path: Option<String>,
) -> Result<DeployConfig> {
    let project_root = settings
        .project_root
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| Error::config_missing_key("projectRoot", path.clone()))?;
    let project_root = project_root.trim_end_matches('/').to_string();
    if project_root.is_empty() {
        return Err(Error::config_invalid_value(
            "projectRoot",
            Some("/".to_string()),
            "Project root cannot be the filesystem root",
        ));
    }

    let under_project = |value: Option<String>, default: &str| -> String {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) if v.starts_with('/') => v.trim_end_matches('/').to_string(),
            Some(v) => join_path(&project_root, &v),
            None => join_path(&project_root, default),
        }
    };

    let releases_root = under_project(settings.releases_root, "releases");
    let shared_root = under_project(settings.shared_root, "shared");
    let repository_root = under_project(settings.repository_root, "repository.git");
    let drupal_root = settings
        .drupal_root
        .map(|root| under_project(Some(root), "current"));

    for (target, link) in &settings.shared_files {
        if target.trim().is_empty() || link.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "sharedFiles",
                Some(format!("{} -> {}", target, link)),
                "Shared file entries need both a target and a link name",
            ));
        }
        if link.split('/').any(|part| part == "..") || target.split('/').any(|p| p == "..") {
            return Err(Error::config_invalid_value(
                "sharedFiles",
                Some(format!("{} -> {}", target, link)),
                "Shared file paths must stay inside their root",
            ));
        }
    }

    if let Some(server) = &settings.server {
        if server.host.trim().is_empty() || server.user.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "server",
                Some(server.host.clone()),
                "Server needs both host and user",
            ));
        }
    }

    Ok(DeployConfig {
        site: site.to_string(),
        environment: environment.to_string(),
        project_root,
        releases_root,
        shared_root,
        repository_root,
        drupal_root,
        shared_files: settings.shared_files,
        keep_releases: settings.keep_releases.unwrap_or(DEFAULT_KEEP_RELEASES),
        server: settings.server,
        hooks: settings.hooks,
        hook_failure_mode: settings.hook_failure_mode.unwrap_or_default(),
        database: settings.database,
    })
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; any other
/// value replaces what was there.
pub(crate) fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Find the config file to use.
///
/// Order: explicit path, `ROLLOUT_CONFIG`, `./rollout.json`,
/// `~/.config/rollout/rollout.json`.
pub fn locate(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(shellexpand::tilde(path).to_string()));
    }

    if let Ok(path) = std::env::var(paths::CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
        }
    }

    let mut tried = Vec::new();
    for candidate in [paths::local_config()?, paths::global_config()?] {
        if candidate.exists() {
            return Ok(candidate);
        }
        tried.push(candidate.to_string_lossy().to_string());
    }

    Err(Error::config_missing_key(paths::CONFIG_FILE_NAME, None)
        .with_hint(format!("Looked in: {}", tried.join(", ")))
        .with_hint(format!(
            "Pass --config <path> or set {}",
            paths::CONFIG_ENV_VAR
        )))
}

/// Locate, load and resolve in one step.
pub fn resolve(explicit: Option<&str>, site: &str, environment: &str) -> Result<DeployConfig> {
    let path = locate(explicit)?;
    ConfigFile::load(&path)?.resolve(site, environment)
}
