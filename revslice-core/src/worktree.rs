//! Exclusive leases on scratch worktrees.
//!
//! Slice commits are built by checking out, removing and committing inside a
//! worktree, so two jobs must never share one. `ScratchWorktree` is not
//! `Clone` and every mutating operation takes `&mut self`.

use crate::error::{Error, Result};
use crate::git::Git;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct ScratchWorktree {
    repo: Git,
    git: Git,
    path: PathBuf,
    // Present when the worktree lives in a directory this lease created.
    temp: Option<TempDir>,
}

impl ScratchWorktree {
    /// Adds a detached worktree of `repo` at `at_ref` in a fresh temporary directory.
    pub async fn create(repo: &Git, at_ref: &str) -> Result<Self> {
        let temp = tempfile::Builder::new().prefix("revslice-").tempdir()?;
        let path = temp.path().join("tree");
        repo.run([
            OsStr::new("worktree"),
            OsStr::new("add"),
            OsStr::new("--quiet"),
            OsStr::new("--detach"),
            path.as_os_str(),
            OsStr::new(at_ref),
        ])
        .await?;
        debug!("created worktree {:?} at {}", path, at_ref);

        Ok(Self {
            repo: repo.clone(),
            git: Git::open(&path),
            path,
            temp: Some(temp),
        })
    }

    /// Leases an existing worktree directory. The caller guarantees nothing
    /// else uses it while the lease is held.
    pub fn attach<P: AsRef<Path>>(repo: &Git, path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(Error::invalid(format!("worktree {:?} is not a directory", path)));
        }
        Ok(Self {
            repo: repo.clone(),
            git: Git::open(&path),
            path,
            temp: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Git handle for read-only queries against the worktree.
    ///
    /// Only the query methods of [`Git`] are public, so a shared lease cannot
    /// be used to move the worktree:
    ///
    /// ```compile_fail
    /// async fn detach(tree: &revslice_core::ScratchWorktree) {
    ///     tree.git().run(["checkout", "--detach", "HEAD~1"]).await.ok();
    /// }
    /// ```
    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Git handle for commands that change the worktree.
    pub(crate) fn git_mut(&mut self) -> &Git {
        &self.git
    }

    /// Deregisters a worktree this lease created. Attached worktrees are left alone.
    pub async fn remove(mut self) -> Result<()> {
        let Some(temp) = self.temp.take() else {
            return Ok(());
        };
        let removed = self
            .repo
            .run([
                OsStr::new("worktree"),
                OsStr::new("remove"),
                OsStr::new("--force"),
                self.path.as_os_str(),
            ])
            .await;
        match removed {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("failed to remove worktree {:?}: {}", self.path, e);
                // Deleting the directory first lets prune drop the stale entry.
                drop(temp);
                self.repo.run(["worktree", "prune"]).await.map(|_| ())
            }
        }
    }
}
