//! Git helpers run through an [`Executor`], locally or on the deploy host.

use crate::error::{Error, Result};
use crate::executor::{CommandOutput, Executor, InDir, RunOptions};
use crate::utils::shell::quote_arg;

/// A git working copy (or bare repository) at `root`.
pub struct Repository<'a> {
    executor: InDir<'a>,
}

impl<'a> Repository<'a> {
    pub fn open(executor: &'a dyn Executor, root: impl Into<String>) -> Self {
        Self {
            executor: InDir::new(executor, root),
        }
    }

    pub fn root(&self) -> &str {
        self.executor.dir()
    }

    fn git(&self, args: &str, quiet: bool) -> Result<CommandOutput> {
        let command = format!("git {}", args);
        let options = if quiet {
            RunOptions::quiet()
        } else {
            RunOptions::default()
        };
        let output = self.executor.execute(&command, &options);
        if output.success {
            return Ok(output);
        }
        Err(Error::git_command_failed(format!(
            "{} failed in {}: {}",
            command,
            self.root(),
            output.error_text()
        )))
    }

    pub fn push_tag(&self, tag: &str, remote: &str) -> Result<()> {
        self.git(&format!("push {} {}", quote_arg(remote), quote_arg(tag)), false)?;
        Ok(())
    }

    /// Fetch tags (pruning deleted refs), check out `tag` and bring
    /// submodules in line with it.
    pub fn update_repository(&self, tag: &str) -> Result<()> {
        self.git("fetch -t -p", false)?;
        self.git(&format!("checkout {}", quote_arg(tag)), false)?;
        self.git("submodule sync", false)?;
        self.git("submodule update --init", false)?;
        log_status!("git", "{} now at {}", self.root(), tag);
        Ok(())
    }

    /// Most recent tag reachable from `commit` (HEAD by default); `None` when
    /// no tag is reachable.
    pub fn latest_tag(&self, commit: Option<&str>) -> Result<Option<String>> {
        let command = format!(
            "git describe --tags --abbrev=0 {}",
            quote_arg(commit.unwrap_or("HEAD"))
        );
        let output = self.executor.run_quiet(&command);
        if output.success {
            let tag = output.stdout.trim();
            return Ok((!tag.is_empty()).then(|| tag.to_string()));
        }

        let stderr = output.stderr.to_lowercase();
        if stderr.contains("no names found") || stderr.contains("no tags can describe") {
            return Ok(None);
        }

        Err(Error::git_command_failed(format!(
            "{} failed in {}: {}",
            command,
            self.root(),
            output.error_text()
        )))
    }

    /// Full hash of HEAD.
    pub fn latest_commit(&self) -> Result<String> {
        let output = self.git("rev-parse HEAD", true)?;
        Ok(output.stdout.trim().to_string())
    }

    /// One-line summaries of the commits in `first..last`, oldest first.
    pub fn commit_messages(&self, first: &str, last: &str) -> Result<Vec<String>> {
        let output = self.git(
            &format!("log --reverse --oneline {}", quote_arg(&format!("{}..{}", first, last))),
            true,
        )?;
        Ok(output.lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::executor::LocalExecutor;

    const GIT: &str = "git -c user.name=rollout -c user.email=rollout@example.com -c commit.gpgsign=false -c tag.gpgsign=false";

    fn repo_with_commits(dir: &std::path::Path, messages: &[&str]) {
        let local = LocalExecutor;
        let scoped = InDir::new(&local, dir.to_string_lossy().to_string());
        scoped.run_quiet("git init -q");
        for message in messages {
            scoped
                .run_with(
                    &format!(
                        "echo {m} >> log.txt && git add log.txt && {GIT} commit -q -m {m}",
                        m = quote_arg(message)
                    ),
                    &RunOptions::quiet(),
                )
                .unwrap();
        }
    }

    #[test]
    fn latest_tag_is_none_without_tags() {
        let dir = tempfile::tempdir().unwrap();
        repo_with_commits(dir.path(), &["first"]);

        let local = LocalExecutor;
        let repo = Repository::open(&local, dir.path().to_string_lossy().to_string());
        assert_eq!(repo.latest_tag(None).unwrap(), None);
    }

    #[test]
    fn latest_tag_and_commit_messages() {
        let dir = tempfile::tempdir().unwrap();
        repo_with_commits(dir.path(), &["first"]);

        let local = LocalExecutor;
        let repo = Repository::open(&local, dir.path().to_string_lossy().to_string());
        repo.executor
            .run_with(&format!("{GIT} tag 1.0"), &RunOptions::quiet())
            .unwrap();
        let first = repo.latest_commit().unwrap();
        assert_eq!(first.len(), 40);

        repo_with_commits(dir.path(), &["second", "third"]);
        assert_eq!(repo.latest_tag(None).unwrap().as_deref(), Some("1.0"));

        let messages = repo.commit_messages("1.0", "HEAD").unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].ends_with("second"));
        assert!(messages[1].ends_with("third"));
    }

    #[test]
    fn git_failures_use_git_error_code() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalExecutor;
        let repo = Repository::open(&local, dir.path().to_string_lossy().to_string());
        let err = repo.latest_commit().unwrap_err();
        assert_eq!(err.code, ErrorCode::GitCommandFailed);
    }
}
