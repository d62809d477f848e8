//! Drush wrappers for Drupal sites.
//!
//! Commands run in the configured `drupalRoot`; module lists are read from
//! `modules.enabled` / `modules.disabled` in the project root.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::DeployConfig;
use crate::error::{Error, Result};
use crate::executor::{Executor, InDir, RunOptions};
use crate::utils::shell::quote_arg;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleChanges {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

pub struct Drupal<'a> {
    drupal_root: InDir<'a>,
    project_root: InDir<'a>,
}

impl<'a> Drupal<'a> {
    pub fn new(
        executor: &'a dyn Executor,
        drupal_root: impl Into<String>,
        project_root: impl Into<String>,
    ) -> Self {
        Self {
            drupal_root: InDir::new(executor, drupal_root),
            project_root: InDir::new(executor, project_root),
        }
    }

    pub fn from_config(executor: &'a dyn Executor, config: &DeployConfig) -> Result<Self> {
        let drupal_root = config.require_drupal_root()?;
        Ok(Self::new(executor, drupal_root, config.project_root.clone()))
    }

    /// `drush -y <command>`; returns stdout.
    pub fn drush(&self, command: &str) -> Result<String> {
        let output = self
            .drupal_root
            .execute(&format!("drush -y {}", command), &RunOptions::default());
        if !output.success {
            return Err(Error::drupal_command_failed(command, output.error_text()));
        }
        Ok(output.stdout)
    }

    fn drush_lines(&self, command: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .drush(command)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn read_module_list(&self, file: &str) -> Result<BTreeSet<String>> {
        let output = self
            .project_root
            .run_with(&format!("cat {}", quote_arg(file)), &RunOptions::quiet())?;
        Ok(output.lines().into_iter().map(|l| l.trim().to_string()).collect())
    }

    /// Bring the site's module states in line with the module list files.
    ///
    /// With a `site`, `modules.<site>.enabled` and `modules.<site>.disabled`
    /// must both exist and extend the global lists. A module listed as both
    /// enabled and disabled ends up disabled. The cache is cleared after
    /// every change.
    pub fn enable_disable_modules(&self, site: Option<&str>) -> Result<ModuleChanges> {
        let mut wanted_enabled = self.read_module_list("modules.enabled")?;
        let mut wanted_disabled = self.read_module_list("modules.disabled")?;

        if let Some(site) = site {
            let site_enabled = format!("modules.{}.enabled", site);
            let site_disabled = format!("modules.{}.disabled", site);
            if !self.project_root.path_exists(&site_enabled)
                || !self.project_root.path_exists(&site_disabled)
            {
                return Err(Error::validation_invalid_argument(
                    "site",
                    format!(
                        "Couldn't find the site-specific module files ({} and {})",
                        site_enabled, site_disabled
                    ),
                    Some(site.to_string()),
                    None,
                ));
            }
            wanted_enabled.extend(self.read_module_list(&site_enabled)?);
            wanted_disabled.extend(self.read_module_list(&site_disabled)?);
        }

        wanted_enabled.retain(|module| !wanted_disabled.contains(module));

        let currently_enabled = self.drush_lines("pm-list --status=enabled --pipe")?;
        let currently_disabled =
            self.drush_lines("pm-list --status=\"disabled,not installed\" --pipe")?;

        let to_enable: Vec<String> = currently_disabled
            .intersection(&wanted_enabled)
            .cloned()
            .collect();
        let to_disable: Vec<String> = currently_enabled
            .intersection(&wanted_disabled)
            .cloned()
            .collect();

        if to_enable.is_empty() {
            log_status!("drupal", "No modules to enable");
        } else {
            log_status!("drupal", "Enabling: {}", to_enable.join(", "));
        }
        for module in &to_enable {
            self.drush(&format!("pm-enable {}", quote_arg(module)))?;
            self.clear_cache()?;
        }

        if to_disable.is_empty() {
            log_status!("drupal", "No modules to disable");
        } else {
            log_status!("drupal", "Disabling: {}", to_disable.join(", "));
        }
        for module in &to_disable {
            self.drush(&format!("pm-disable {}", quote_arg(module)))?;
            self.clear_cache()?;
        }

        Ok(ModuleChanges {
            enabled: to_enable,
            disabled: to_disable,
        })
    }

    pub fn set_maintenance_mode(&self, enabled: bool) -> Result<()> {
        self.drush(&format!("vset maintenance_mode {}", if enabled { 1 } else { 0 }))?;
        Ok(())
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.drush("cc all")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::executor::CommandOutput;
    use crate::testing::ScriptedExecutor;

    fn scripted() -> ScriptedExecutor {
        ScriptedExecutor::new()
            .respond("cat modules.enabled", CommandOutput::ok("views\ntoken\nlegacy\n"))
            .respond("cat modules.disabled", CommandOutput::ok("legacy\n"))
            .respond("cat modules.shop.enabled", CommandOutput::ok("panels\n"))
            .respond("cat modules.shop.disabled", CommandOutput::ok("devel\n"))
            .respond("--status=enabled", CommandOutput::ok("views\nlegacy\ndevel\n"))
            .respond("--status=\"disabled", CommandOutput::ok("token\npanels\n"))
    }

    fn drush_calls(executor: &ScriptedExecutor) -> Vec<String> {
        executor
            .commands()
            .into_iter()
            .filter_map(|c| c.split_once("&& drush -y ").map(|(_, rest)| rest.to_string()))
            .collect()
    }

    #[test]
    fn drush_runs_in_drupal_root() {
        let executor = ScriptedExecutor::new();
        let drupal = Drupal::new(&executor, "/srv/shop/current", "/srv/shop");
        drupal.clear_cache().unwrap();
        assert_eq!(
            executor.commands(),
            vec!["cd '/srv/shop/current' && drush -y cc all"]
        );
    }

    #[test]
    fn global_lists_enable_and_disable() {
        let executor = scripted();
        let drupal = Drupal::new(&executor, "/srv/shop/current", "/srv/shop");

        let changes = drupal.enable_disable_modules(None).unwrap();
        assert_eq!(changes.enabled, vec!["token"]);
        assert_eq!(changes.disabled, vec!["legacy"]);
        assert_eq!(
            drush_calls(&executor)[2..],
            ["pm-enable token", "cc all", "pm-disable legacy", "cc all"]
        );
    }

    #[test]
    fn site_lists_extend_global_lists() {
        let executor = scripted();
        let drupal = Drupal::new(&executor, "/srv/shop/current", "/srv/shop");

        let changes = drupal.enable_disable_modules(Some("shop")).unwrap();
        assert_eq!(changes.enabled, vec!["panels", "token"]);
        assert_eq!(changes.disabled, vec!["devel", "legacy"]);
    }

    #[test]
    fn missing_site_files_are_an_error() {
        let executor = scripted().respond("test -e", CommandOutput::failed(1, ""));
        let drupal = Drupal::new(&executor, "/srv/shop/current", "/srv/shop");

        let err = drupal.enable_disable_modules(Some("shop")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert!(drush_calls(&executor).is_empty());
    }

    #[test]
    fn maintenance_mode_and_failures() {
        let executor =
            ScriptedExecutor::new().respond("vset", CommandOutput::failed(1, "no drush"));
        let drupal = Drupal::new(&executor, "/srv/shop/current", "/srv/shop");

        let err = drupal.set_maintenance_mode(true).unwrap_err();
        assert_eq!(err.code, ErrorCode::DrupalCommandFailed);
        assert_eq!(err.details["command"], "vset maintenance_mode 1");
    }
}
