//! Database dumps and restores on the deploy host.
//!
//! Each engine module composes its client command and runs it through the
//! executor; output goes straight to (or comes from) a file on that host.

pub mod mysql;
pub mod pgsql;

use serde::Serialize;

use crate::config::{DatabaseConfig, DatabaseEngine};
use crate::error::{Error, Result};
use crate::executor::{Executor, RunOptions};

pub const DEFAULT_DATABASE_HOST: &str = "127.0.0.1";

/// Connection parameters for one dump or restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpOptions {
    pub database: String,
    pub user: Option<String>,
    pub host: Option<String>,
    pub password: Option<String>,
}

impl DumpOptions {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            database: config.name.clone(),
            user: config.user.clone(),
            host: config.host.clone(),
            password: config.password.clone(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbResult {
    pub engine: DatabaseEngine,
    pub database: String,
    pub path: String,
}

/// Whether the engine needs a password for these options.
///
/// MySQL always does. PostgreSQL only for TCP connections; local ones go
/// through `sudo -u <user>` and peer authentication.
pub fn needs_password(engine: DatabaseEngine, options: &DumpOptions) -> bool {
    match engine {
        DatabaseEngine::Mysql => true,
        DatabaseEngine::Postgres => options.host.is_some(),
    }
}

pub fn dump(
    executor: &dyn Executor,
    engine: DatabaseEngine,
    options: &DumpOptions,
    backup_path: &str,
) -> Result<DbResult> {
    match engine {
        DatabaseEngine::Mysql => mysql::dump(executor, options, backup_path)?,
        DatabaseEngine::Postgres => pgsql::dump(executor, options, backup_path)?,
    }
    log_status!("db", "Dumped {} to {}", options.database, backup_path);
    Ok(DbResult {
        engine,
        database: options.database.clone(),
        path: backup_path.to_string(),
    })
}

pub fn restore(
    executor: &dyn Executor,
    engine: DatabaseEngine,
    options: &DumpOptions,
    backup_path: &str,
) -> Result<DbResult> {
    match engine {
        DatabaseEngine::Mysql => mysql::restore(executor, options, backup_path)?,
        DatabaseEngine::Postgres => pgsql::restore(executor, options, backup_path)?,
    }
    log_status!("db", "Restored {} from {}", options.database, backup_path);
    Ok(DbResult {
        engine,
        database: options.database.clone(),
        path: backup_path.to_string(),
    })
}

/// Run a composed client command, mapping failure to a database error.
fn run_client(
    executor: &dyn Executor,
    command: &str,
    options: &RunOptions,
    action: &str,
    database: &str,
) -> Result<()> {
    let output = executor.execute(command, options);
    if output.success {
        return Ok(());
    }
    Err(Error::db_command_failed(
        format!("Could not {} database '{}'", action, database),
        output.error_text(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_requirements() {
        let local = DumpOptions::new("shop");
        let remote = DumpOptions {
            host: Some("db.internal".to_string()),
            ..DumpOptions::new("shop")
        };
        assert!(needs_password(DatabaseEngine::Mysql, &local));
        assert!(!needs_password(DatabaseEngine::Postgres, &local));
        assert!(needs_password(DatabaseEngine::Postgres, &remote));
    }

    #[test]
    fn options_from_config_copy_connection() {
        let config = DatabaseConfig {
            engine: DatabaseEngine::Mysql,
            name: "shop".to_string(),
            user: Some("shop".to_string()),
            host: None,
            password: Some("pw".to_string()),
        };
        let options = DumpOptions::from_config(&config);
        assert_eq!(options.database, "shop");
        assert_eq!(options.user.as_deref(), Some("shop"));
        assert_eq!(options.password.as_deref(), Some("pw"));
    }
}
