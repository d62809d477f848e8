use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Name of the per-project config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "rollout.json";

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ROLLOUT_CONFIG";

/// Base rollout config directory (universal ~/.config/rollout/ on all platforms)
pub fn rollout() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("rollout"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("rollout"))
    }
}

/// Global rollout.json config file path
pub fn global_config() -> Result<PathBuf> {
    Ok(rollout()?.join(CONFIG_FILE_NAME))
}

/// Config file in the current working directory
pub fn local_config() -> Result<PathBuf> {
    let cwd = env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("current dir".to_string())))?;
    Ok(cwd.join(CONFIG_FILE_NAME))
}
