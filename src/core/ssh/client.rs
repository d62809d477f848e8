use crate::config::ServerConfig;
use crate::error::{Error, Result, TargetDetails};
use crate::executor::{compose_command, CommandOutput, Executor, RunOptions};
use std::process::Command;

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the server host is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

impl SshClient {
    pub fn from_server(server: &ServerConfig) -> Result<Self> {
        let identity_file = match &server.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        server.host.clone(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&server.host);
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", server.host);
        }

        Ok(Self {
            host: server.host.clone(),
            user: server.user.clone(),
            port: server.port,
            identity_file,
            is_local,
        })
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Non-interactive: never prompt, never hang on a dead connection.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    fn execute_with_retry(&self, command: &str, max_attempts: u32) -> CommandOutput {
        if self.is_local {
            return execute_local_command(command);
        }

        let backoff_secs = [0, 2, 5]; // delays before retry 1, 2, 3

        let mut last = CommandOutput::failed(-1, "SSH retry exhausted");
        for attempt in 0..max_attempts {
            last = self.execute_once(command);

            // Only retry on transient connection errors, not command failures
            if last.success || attempt + 1 >= max_attempts || !is_transient_ssh_error(&last) {
                return last;
            }

            let delay = backoff_secs.get(attempt as usize + 1).copied().unwrap_or(5);
            log_status!(
                "ssh",
                "Connection failed (attempt {}/{}), retrying in {}s...",
                attempt + 1,
                max_attempts,
                delay
            );
            std::thread::sleep(std::time::Duration::from_secs(delay));
        }

        last
    }

    fn execute_once(&self, command: &str) -> CommandOutput {
        let output = Command::new("ssh").args(self.build_ssh_args(command)).output();

        match output {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::failed(-1, format!("SSH error: {}", e)),
        }
    }
}

impl Executor for SshClient {
    fn execute(&self, command: &str, options: &RunOptions) -> CommandOutput {
        if !options.quiet {
            log_status!("ssh", "[{}] {}", self.host, command);
        }
        self.execute_with_retry(&compose_command(command, options), 3)
    }

    fn target(&self) -> TargetDetails {
        TargetDetails {
            host: Some(self.host.clone()),
            user: Some(self.user.clone()),
        }
    }
}

pub fn execute_local_command(command: &str) -> CommandOutput {
    execute_local_command_in_dir(command, None, None)
}

pub fn execute_local_command_in_dir(
    command: &str,
    current_dir: Option<&str>,
    env: Option<&[(&str, &str)]>,
) -> CommandOutput {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);

    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    if let Some(env_pairs) = env {
        cmd.envs(env_pairs.iter().copied());
    }

    match cmd.output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::failed(-1, format!("Command error: {}", e)),
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Check if an SSH failure is a transient connection error worth retrying.
///
/// ssh exits 255 on its own errors, but a remote command may exit 255 too,
/// so stderr must also name a connection problem.
fn is_transient_ssh_error(output: &CommandOutput) -> bool {
    if output.exit_code != 255 {
        return false;
    }
    let stderr = output.stderr.to_lowercase();

    let transient_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "temporary failure in name resolution",
        "could not resolve hostname",
        "broken pipe",
        "ssh_exchange_identification",
        "connection closed by remote host",
    ];

    transient_patterns.iter().any(|p| stderr.contains(p))
}
