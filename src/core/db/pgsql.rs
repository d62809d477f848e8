use super::{run_client, DumpOptions};
use crate::error::Result;
use crate::executor::{Executor, RunOptions};
use crate::utils::shell::{quote_arg, quote_path};

const DEFAULT_USER: &str = "postgres";

fn user(options: &DumpOptions) -> &str {
    options.user.as_deref().unwrap_or(DEFAULT_USER)
}

/// Without a host the client runs as the database user over the local
/// socket; with one it connects over TCP with `PGPASSWORD` when given.
fn connection(options: &DumpOptions) -> (String, RunOptions) {
    match options.host.as_deref() {
        None => (String::new(), RunOptions::default().as_user(user(options))),
        Some(host) => {
            let mut run_options = RunOptions::default();
            if let Some(password) = &options.password {
                run_options = run_options.with_env("PGPASSWORD", password.clone());
            }
            (
                format!(" -U {} -h {}", quote_arg(user(options)), quote_arg(host)),
                run_options,
            )
        }
    }
}

/// Custom-format (`-Fc`) archive of the database.
pub fn dump(executor: &dyn Executor, options: &DumpOptions, backup_path: &str) -> Result<()> {
    let (args, run_options) = connection(options);
    let command = format!(
        "pg_dump -Fc{} {} > {}",
        args,
        quote_arg(&options.database),
        quote_path(backup_path)
    );
    run_client(executor, &command, &run_options, "dump", &options.database)
}

pub fn restore(executor: &dyn Executor, options: &DumpOptions, backup_path: &str) -> Result<()> {
    let (args, run_options) = connection(options);
    let command = format!(
        "pg_restore --clean --if-exists{} -d {} {}",
        args,
        quote_arg(&options.database),
        quote_path(backup_path)
    );
    run_client(executor, &command, &run_options, "restore", &options.database)
}
