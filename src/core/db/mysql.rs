use super::{run_client, DumpOptions, DEFAULT_DATABASE_HOST};
use crate::error::{Error, Result};
use crate::executor::{Executor, RunOptions};
use crate::utils::shell::{quote_arg, quote_path};

const DEFAULT_USER: &str = "root";

fn connection_args(options: &DumpOptions) -> String {
    format!(
        "-h{} -u{}",
        quote_arg(options.host.as_deref().unwrap_or(DEFAULT_DATABASE_HOST)),
        quote_arg(options.user.as_deref().unwrap_or(DEFAULT_USER))
    )
}

/// The password travels in `MYSQL_PWD` so it never shows up in argv.
fn run_options(options: &DumpOptions) -> Result<RunOptions> {
    let password = options
        .password
        .as_deref()
        .ok_or_else(|| Error::validation_missing_argument(vec!["password".to_string()]))?;
    Ok(RunOptions::default().with_env("MYSQL_PWD", password))
}

pub fn dump(executor: &dyn Executor, options: &DumpOptions, backup_path: &str) -> Result<()> {
    let command = format!(
        "mysqldump {} {} > {}",
        quote_arg(&options.database),
        connection_args(options),
        quote_path(backup_path)
    );
    run_client(executor, &command, &run_options(options)?, "dump", &options.database)
}

pub fn restore(executor: &dyn Executor, options: &DumpOptions, backup_path: &str) -> Result<()> {
    let command = format!(
        "mysql {} {} < {}",
        quote_arg(&options.database),
        connection_args(options),
        quote_path(backup_path)
    );
    run_client(executor, &command, &run_options(options)?, "restore", &options.database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::executor::CommandOutput;
    use crate::testing::ScriptedExecutor;

    #[test]
    fn dump_uses_defaults_and_env_password() {
        let executor = ScriptedExecutor::new();
        let options = DumpOptions::new("shop").with_password("s3cret");

        dump(&executor, &options, "/tmp/shop.sql").unwrap();

        assert_eq!(
            executor.commands(),
            vec!["mysqldump shop -h127.0.0.1 -uroot > '/tmp/shop.sql'"]
        );
        assert_eq!(
            executor.options(0).env,
            vec![("MYSQL_PWD".to_string(), "s3cret".to_string())]
        );
    }

    #[test]
    fn restore_reads_from_file() {
        let executor = ScriptedExecutor::new();
        let options = DumpOptions {
            user: Some("shop".to_string()),
            host: Some("db1".to_string()),
            ..DumpOptions::new("shop")
        }
        .with_password("pw");

        restore(&executor, &options, "/tmp/shop.sql").unwrap();
        assert_eq!(
            executor.commands(),
            vec!["mysql shop -hdb1 -ushop < '/tmp/shop.sql'"]
        );
    }

    #[test]
    fn missing_password_is_rejected_before_running() {
        let executor = ScriptedExecutor::new();
        let err = dump(&executor, &DumpOptions::new("shop"), "/tmp/x.sql").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert!(executor.commands().is_empty());
    }

    #[test]
    fn client_failure_maps_to_db_error() {
        let executor = ScriptedExecutor::new()
            .respond("mysqldump", CommandOutput::failed(2, "Access denied"));
        let options = DumpOptions::new("shop").with_password("bad");

        let err = dump(&executor, &options, "/tmp/x.sql").unwrap_err();
        assert_eq!(err.code, ErrorCode::DbCommandFailed);
        assert_eq!(err.details["stderr"], "Access denied");
    }
}
