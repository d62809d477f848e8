// Public modules
pub mod config;
pub mod db;
pub mod deploy;
pub mod drupal;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod lock;
pub mod releases;
pub mod signals;
pub mod ssh;
pub mod vcs;
pub mod version_files;

// Internal modules - not part of public API
pub(crate) mod paths;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use executor::{CommandOutput, Executor, InDir, LocalExecutor, RunOptions};
pub use releases::{Release, ReleaseLayout, ReleaseManager, ReleaseState};
pub use signals::SignalBus;
