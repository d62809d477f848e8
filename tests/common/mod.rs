#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rollout::error::TargetDetails;
use rollout::executor::{CommandOutput, Executor, LocalExecutor, RunOptions};
use rollout::releases::ReleaseLayout;
use tempfile::TempDir;

const GIT: &str = "git -c user.name=rollout -c user.email=rollout@example.com -c commit.gpgsign=false -c tag.gpgsign=false";

/// A project root in a temp directory with the default layout.
pub struct Project {
    pub dir: TempDir,
    pub layout: ReleaseLayout,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        std::fs::create_dir_all(root.join("releases")).unwrap();
        std::fs::create_dir_all(root.join("shared")).unwrap();
        let layout = ReleaseLayout::from_project_root(&root.to_string_lossy());
        Self { dir, layout }
    }

    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.layout.project_root)
    }

    pub fn releases(&self) -> PathBuf {
        PathBuf::from(&self.layout.releases_root)
    }

    pub fn shared(&self) -> PathBuf {
        PathBuf::from(&self.layout.shared_root)
    }

    /// Create an (empty) release directory without going through git.
    pub fn add_release(&self, name: &str) -> PathBuf {
        let path = self.releases().join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn point_current_at(&self, name: &str) {
        let link = self.root().join("current");
        let _ = std::fs::remove_file(&link);
        std::os::unix::fs::symlink(self.releases().join(name), link).unwrap();
    }

    pub fn current_target(&self) -> Option<PathBuf> {
        std::fs::read_link(self.root().join("current")).ok()
    }

    pub fn release_dirs(&self) -> Vec<String> {
        entries(&self.releases())
    }

    /// A repository at `repository_root` with tags `1.0` and `1.1`; `index.txt`
    /// holds the tag it was committed under.
    pub fn init_repository(&self) {
        let repo = PathBuf::from(&self.layout.repository_root);
        std::fs::create_dir_all(&repo).unwrap();
        let local = LocalExecutor;
        let scoped = local_in(&local, &repo);
        scoped
            .run_with("git init -q", &RunOptions::quiet())
            .unwrap();
        for tag in ["1.0", "1.1"] {
            std::fs::write(repo.join("index.txt"), tag).unwrap();
            scoped
                .run_with(
                    &format!("git add index.txt && {GIT} commit -q -m {tag} && {GIT} tag {tag}"),
                    &RunOptions::quiet(),
                )
                .unwrap();
        }
    }
}

fn local_in<'a>(executor: &'a LocalExecutor, dir: &Path) -> rollout::executor::InDir<'a> {
    rollout::executor::InDir::new(executor, dir.to_string_lossy().to_string())
}

/// Sorted entry names of a directory, hidden ones included.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Local executor that fails every command containing one of `fail_on`.
pub struct FailingExecutor {
    pub fail_on: Vec<String>,
    inner: LocalExecutor,
}

impl FailingExecutor {
    pub fn new(patterns: &[&str]) -> Self {
        Self {
            fail_on: patterns.iter().map(|p| p.to_string()).collect(),
            inner: LocalExecutor,
        }
    }
}

impl Executor for FailingExecutor {
    fn execute(&self, command: &str, options: &RunOptions) -> CommandOutput {
        if self.fail_on.iter().any(|p| command.contains(p.as_str())) {
            return CommandOutput::failed(1, "injected failure");
        }
        self.inner.execute(command, options)
    }

    fn target(&self) -> TargetDetails {
        self.inner.target()
    }
}
