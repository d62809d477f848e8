//! CLI response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use rollout::error::Hint;
use rollout::{Error, ErrorCode, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
                retryable: err.retryable,
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

pub fn print_success<T: Serialize>(data: T) -> Result<()> {
    print_response(&CliResponse::success(data))
}

pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::ConfigSiteNotFound
        | ErrorCode::ConfigEnvironmentNotFound
        | ErrorCode::ReleaseNone
        | ErrorCode::ReleaseNotFound => 4,

        ErrorCode::SshIdentityFileNotFound => 10,

        ErrorCode::ReleaseCreationFailed
        | ErrorCode::ReleaseLinkFailed
        | ErrorCode::ReleaseActivationFailed
        | ErrorCode::ReleaseActive
        | ErrorCode::ReleaseLocked
        | ErrorCode::SignalCallbackFailed
        | ErrorCode::RemoteCommandFailed
        | ErrorCode::GitCommandFailed
        | ErrorCode::DbCommandFailed
        | ErrorCode::DrupalCommandFailed => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    match result {
        Ok(data) => print_success(data),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout::error::{RemoteCommandFailedDetails, TargetDetails};

    #[test]
    fn remote_command_failed_serializes_stdout_stderr() {
        let err = Error::remote_command_failed(RemoteCommandFailedDetails {
            command: "ls -la".to_string(),
            exit_code: 127,
            stdout: "some stdout".to_string(),
            stderr: "some stderr".to_string(),
            target: TargetDetails {
                host: Some("example.com".to_string()),
                user: Some("deploy".to_string()),
            },
        });

        let json = CliResponse::<()>::from_error(&err).to_json().unwrap();

        assert!(json.contains("\"code\": \"remote.command_failed\""));
        assert!(json.contains("some stdout"));
        assert!(json.contains("some stderr"));
        assert!(json.contains("\"exitCode\": 127"));
    }

    #[test]
    fn release_errors_map_to_exit_codes() {
        let (_, code) =
            map_cmd_result_to_json::<()>(Err(Error::release_none("/srv/app/releases")));
        assert_eq!(code, 4);

        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::release_locked(
            "/srv/app/releases/.deploy.lock",
            None,
        )));
        assert_eq!(code, 20);

        let (_, code) = map_cmd_result_to_json::<()>(Err(Error::config_missing_key(
            "projectRoot",
            None,
        )));
        assert_eq!(code, 2);
    }

    #[test]
    fn success_keeps_command_exit_code() {
        let (value, code) = map_cmd_result_to_json(Ok((serde_json::json!({"ok": true}), 20)));
        assert_eq!(code, 20);
        assert_eq!(value.unwrap()["ok"], true);
    }
}
