use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,
    ConfigSiteNotFound,
    ConfigEnvironmentNotFound,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    ReleaseCreationFailed,
    ReleaseLinkFailed,
    ReleaseActivationFailed,
    ReleaseNone,
    ReleaseNotFound,
    ReleaseActive,
    ReleaseLocked,

    SignalCallbackFailed,

    SshIdentityFileNotFound,
    RemoteCommandFailed,

    GitCommandFailed,
    DbCommandFailed,
    DrupalCommandFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ConfigSiteNotFound => "config.site_not_found",
            ErrorCode::ConfigEnvironmentNotFound => "config.environment_not_found",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ReleaseCreationFailed => "release.creation_failed",
            ErrorCode::ReleaseLinkFailed => "release.link_failed",
            ErrorCode::ReleaseActivationFailed => "release.activation_failed",
            ErrorCode::ReleaseNone => "release.none",
            ErrorCode::ReleaseNotFound => "release.not_found",
            ErrorCode::ReleaseActive => "release.active",
            ErrorCode::ReleaseLocked => "release.locked",

            ErrorCode::SignalCallbackFailed => "signal.callback_failed",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",
            ErrorCode::RemoteCommandFailed => "remote.command_failed",

            ErrorCode::GitCommandFailed => "git.command_failed",
            ErrorCode::DbCommandFailed => "db.command_failed",
            ErrorCode::DrupalCommandFailed => "drupal.command_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    /// True for every error raised by a configuration problem the caller must fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConfigMissingKey
                | ErrorCode::ConfigInvalidJson
                | ErrorCode::ConfigInvalidValue
                | ErrorCode::ConfigSiteNotFound
                | ErrorCode::ConfigEnvironmentNotFound
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseFailureDetails {
    pub release: String,
    pub path: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkFailureDetails {
    pub release: String,
    pub target: String,
    pub link: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseLockedDetails {
    pub lock_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub target: TargetDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshIdentityFileNotFoundDetails {
    pub host: String,
    pub identity_file: String,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid argument: {}", problem),
            details,
        )
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        let details = to_details(ConfigMissingKeyDetails {
            key: key.clone(),
            path,
        });

        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration key '{}'", key),
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        let details = to_details(ConfigInvalidValueDetails {
            key: key.clone(),
            value,
            problem: problem.clone(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value for '{}': {}", key, problem),
            details,
        )
    }

    pub fn config_site_not_found(site: impl Into<String>, available: Vec<String>) -> Self {
        let site = site.into();
        Self::new(
            ErrorCode::ConfigSiteNotFound,
            format!("Site '{}' is not configured", site),
            serde_json::json!({ "site": site, "available": available }),
        )
        .with_hint("Add the site under \"sites\" in rollout.json")
    }

    pub fn config_environment_not_found(
        site: impl Into<String>,
        environment: impl Into<String>,
        available: Vec<String>,
    ) -> Self {
        let site = site.into();
        let environment = environment.into();
        Self::new(
            ErrorCode::ConfigEnvironmentNotFound,
            format!("Site '{}' has no '{}' environment", site, environment),
            serde_json::json!({
                "site": site,
                "environment": environment,
                "available": available,
            }),
        )
    }

    pub fn release_creation_failed(
        release: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        let release = release.into();
        let reason = reason.into();
        let details = to_details(ReleaseFailureDetails {
            release: release.clone(),
            path: path.into(),
            reason: reason.clone(),
            stderr,
        });

        Self::new(
            ErrorCode::ReleaseCreationFailed,
            format!("Could not create release '{}': {}", release, reason),
            details,
        )
    }

    pub fn release_link_failed(
        release: impl Into<String>,
        target: impl Into<String>,
        link: impl Into<String>,
        reason: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        let release = release.into();
        let link = link.into();
        let reason = reason.into();
        let details = to_details(LinkFailureDetails {
            release: release.clone(),
            target: target.into(),
            link: link.clone(),
            reason: reason.clone(),
            stderr,
        });

        Self::new(
            ErrorCode::ReleaseLinkFailed,
            format!(
                "Could not link '{}' in release '{}': {}",
                link, release, reason
            ),
            details,
        )
    }

    pub fn release_activation_failed(
        release: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        let release = release.into();
        let reason = reason.into();
        let details = to_details(ReleaseFailureDetails {
            release: release.clone(),
            path: path.into(),
            reason: reason.clone(),
            stderr,
        });

        Self::new(
            ErrorCode::ReleaseActivationFailed,
            format!("Could not activate release '{}': {}", release, reason),
            details,
        )
    }

    pub fn release_none(releases_root: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ReleaseNone,
            "No releases found",
            serde_json::json!({ "releasesRoot": releases_root.into() }),
        )
        .with_hint("Run 'rollout release create' or 'rollout deploy' first")
    }

    pub fn release_not_found(release: impl Into<String>, path: impl Into<String>) -> Self {
        let release = release.into();
        Self::new(
            ErrorCode::ReleaseNotFound,
            format!("Release '{}' does not exist", release),
            serde_json::json!({ "release": release, "path": path.into() }),
        )
        .with_hint("Run 'rollout release list' to see available releases")
    }

    pub fn release_active(release: impl Into<String>) -> Self {
        let release = release.into();
        Self::new(
            ErrorCode::ReleaseActive,
            format!("Release '{}' is the current release", release),
            serde_json::json!({ "release": release }),
        )
        .with_hint("Activate another release (or roll back) before invalidating it")
    }

    pub fn release_locked(lock_path: impl Into<String>, owner: Option<String>) -> Self {
        let lock_path = lock_path.into();
        let details = to_details(ReleaseLockedDetails {
            lock_path: lock_path.clone(),
            owner,
        });

        let mut err = Self::new(
            ErrorCode::ReleaseLocked,
            "Another deploy is in progress",
            details,
        )
        .with_hint(format!(
            "If no deploy is running, remove the stale lock with 'rollout release unlock' ({})",
            lock_path
        ));
        err.retryable = Some(true);
        err
    }

    pub fn signal_callback_failed(signal: impl Into<String>, source: Error) -> Self {
        let signal = signal.into();
        Self::new(
            ErrorCode::SignalCallbackFailed,
            format!("Callback for signal '{}' failed: {}", signal, source.message),
            serde_json::json!({
                "signal": signal,
                "cause": {
                    "code": source.code.as_str(),
                    "message": source.message,
                    "details": source.details,
                },
            }),
        )
    }

    pub fn ssh_identity_file_not_found(
        host: impl Into<String>,
        identity_file: impl Into<String>,
    ) -> Self {
        let details = to_details(SshIdentityFileNotFoundDetails {
            host: host.into(),
            identity_file: identity_file.into(),
        });

        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            details,
        )
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let message = if details.stderr.trim().is_empty() {
            format!(
                "Command failed with exit code {}: {}",
                details.exit_code, details.command
            )
        } else {
            format!(
                "Command failed with exit code {}: {}",
                details.exit_code,
                details.stderr.trim()
            )
        };

        Self::new(ErrorCode::RemoteCommandFailed, message, to_details(details))
    }

    pub fn git_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn db_command_failed(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DbCommandFailed,
            message,
            serde_json::json!({ "stderr": stderr.into() }),
        )
    }

    pub fn drupal_command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        let command = command.into();
        Self::new(
            ErrorCode::DrupalCommandFailed,
            format!("drush command failed: {}", command),
            serde_json::json!({ "command": command, "stderr": stderr.into() }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            format!("Unexpected error: {}", error),
            serde_json::json!({ "error": error }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_error_is_retryable_with_hint() {
        let err = Error::release_locked("/srv/app/releases/.deploy.lock", Some("ops@box".into()));
        assert_eq!(err.code, ErrorCode::ReleaseLocked);
        assert_eq!(err.retryable, Some(true));
        assert_eq!(err.hints.len(), 1);
        assert_eq!(err.details["owner"], "ops@box");
    }

    #[test]
    fn signal_failure_wraps_cause() {
        let cause = Error::internal_unexpected("boom");
        let err = Error::signal_callback_failed("pre_deploy", cause);
        assert_eq!(err.code, ErrorCode::SignalCallbackFailed);
        assert_eq!(err.details["cause"]["code"], "internal.unexpected");
        assert!(err.message.contains("pre_deploy"));
    }

    #[test]
    fn configuration_codes_are_grouped() {
        assert!(ErrorCode::ConfigMissingKey.is_configuration());
        assert!(ErrorCode::ConfigSiteNotFound.is_configuration());
        assert!(!ErrorCode::ReleaseLinkFailed.is_configuration());
    }
}
