//! Mutual exclusion between deploys of the same project.
//!
//! The lock is a directory under the releases root: `mkdir` either creates
//! it or fails, on local and remote filesystems alike. An `owner` file inside
//! records who holds it.

use crate::error::{Error, Result};
use crate::executor::{Executor, RunOptions};
use crate::utils::shell::{join_path, quote_path};

pub const LOCK_DIR_NAME: &str = ".deploy.lock";
const OWNER_FILE: &str = "owner";

pub fn lock_path(releases_root: &str) -> String {
    join_path(releases_root, LOCK_DIR_NAME)
}

/// `user@host pid N since <rfc3339>` for the current process.
pub fn default_owner() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!(
        "{}@{} pid {} since {}",
        user,
        host,
        std::process::id(),
        chrono::Local::now().to_rfc3339()
    )
}

/// Held deploy lock. Released explicitly with [`release`](Self::release) or
/// on drop.
pub struct DeployLock<'a> {
    executor: &'a dyn Executor,
    path: String,
    released: bool,
}

impl<'a> DeployLock<'a> {
    pub fn acquire(executor: &'a dyn Executor, releases_root: &str, owner: &str) -> Result<Self> {
        let path = lock_path(releases_root);

        let created = executor.execute(
            &format!(
                "mkdir -p {} && mkdir {}",
                quote_path(releases_root),
                quote_path(&path)
            ),
            &RunOptions::quiet(),
        );
        if !created.success {
            if executor.is_dir(&path) {
                return Err(Error::release_locked(&path, Self::owner(executor, releases_root)));
            }
            return Err(Error::internal_io(
                created.error_text().to_string(),
                Some(format!("create lock {}", path)),
            ));
        }

        let lock = Self {
            executor,
            path,
            released: false,
        };

        let owner_file = join_path(&lock.path, OWNER_FILE);
        let written = executor.execute(
            &format!(
                "printf '%s\\n' {} > {}",
                quote_path(owner),
                quote_path(&owner_file)
            ),
            &RunOptions::quiet(),
        );
        if !written.success {
            let reason = written.error_text().to_string();
            lock.release()?;
            return Err(Error::internal_io(reason, Some(format!("write {}", owner_file))));
        }

        log_status!("lock", "Acquired {}", lock.path);
        Ok(lock)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.executor
            .run_with(&format!("rm -rf {}", quote_path(&self.path)), &RunOptions::quiet())?;
        log_status!("lock", "Released {}", self.path);
        Ok(())
    }

    /// Who holds the lock under `releases_root`, if anyone.
    pub fn owner(executor: &dyn Executor, releases_root: &str) -> Option<String> {
        let owner_file = join_path(&lock_path(releases_root), OWNER_FILE);
        let output = executor.run_quiet(&format!("cat {}", quote_path(&owner_file)));
        if !output.success {
            return None;
        }
        let owner = output.stdout.trim();
        (!owner.is_empty()).then(|| owner.to_string())
    }

    /// Remove a lock left behind by a crashed deploy. Returns whether one existed.
    pub fn force_unlock(executor: &dyn Executor, releases_root: &str) -> Result<bool> {
        let path = lock_path(releases_root);
        if !executor.is_dir(&path) {
            return Ok(false);
        }
        executor.run(&format!("rm -rf {}", quote_path(&path)))?;
        Ok(true)
    }
}

impl Drop for DeployLock<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let output = self
            .executor
            .run_quiet(&format!("rm -rf {}", quote_path(&self.path)));
        if !output.success {
            log_status!("lock", "Could not remove {}: {}", self.path, output.error_text());
        }
    }
}
