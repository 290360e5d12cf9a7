//! Builds a pair of synthetic commits that isolates one slice's diff.
//!
//! The base commit holds every change outside the slice already applied; the
//! head commit adds the slice's own changes and ends up with exactly the tree
//! of the reviewed head commit.

use crate::config::SliceConfig;
use crate::error::{Error, Result};
use crate::git::Git;
use crate::models::{ChangeOps, SliceCommitPair};
use crate::worktree::ScratchWorktree;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SliceCommitter {
    batch_size: usize,
    author_name: String,
    author_email: String,
}

impl Default for SliceCommitter {
    fn default() -> Self {
        Self::from_config(&SliceConfig::default())
    }
}

impl SliceCommitter {
    pub fn from_config(config: &SliceConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
        }
    }

    /// Builds the slice commit pair in `tree` and leaves it checked out at
    /// the head slice commit.
    ///
    /// On error the worktree may hold a half-applied state; discard it rather
    /// than reuse it.
    pub async fn create_head_slice_commits(
        &self,
        tree: &mut ScratchWorktree,
        base_ref: &str,
        head_commit: &str,
        ops: &ChangeOps,
        slice_paths: &[String],
        label: &str,
    ) -> Result<SliceCommitPair> {
        if base_ref.trim().is_empty() {
            return Err(Error::invalid("base ref is required"));
        }
        if head_commit.trim().is_empty() {
            return Err(Error::invalid("head commit is required"));
        }

        let slice: BTreeSet<String> = slice_paths.iter().cloned().collect();
        let (inside, outside) = ops.partition(&slice);
        let git = tree.git_mut();

        git.run(["checkout", "--quiet", "--force", "--detach", base_ref])
            .await?;

        self.apply(git, &outside, head_commit).await?;
        let base = self.commit(git, &format!("revslice base: everything except {label}")).await?;

        self.apply(git, &inside, head_commit).await?;
        let head = self.commit(git, &format!("revslice slice: {label}")).await?;

        info!(
            "slice {}: {} paths, {}..{}",
            label,
            inside.len(),
            short(&base),
            short(&head)
        );
        Ok(SliceCommitPair { base, head })
    }

    /// Removes then checks out the given paths, in batches.
    ///
    /// Only paths that are still index entries are removed. A removed file
    /// may already have been replaced by a directory of the same name when
    /// the other phase checked out a head path beneath it, and that
    /// directory must survive.
    async fn apply(&self, git: &Git, ops: &ChangeOps, head_commit: &str) -> Result<()> {
        let env = [("GIT_LITERAL_PATHSPECS", "1")];

        let remove: Vec<&str> = ops.remove().iter().map(String::as_str).collect();
        for batch in remove.chunks(self.batch_size) {
            let tracked = git.tracked_paths(batch).await?;
            if tracked.is_empty() {
                continue;
            }
            let mut args = vec!["rm", "-q", "-f", "--ignore-unmatch", "--"];
            args.extend(tracked.iter().map(String::as_str));
            git.run_with_env(args, &env).await?;
        }

        let checkout: Vec<&str> = ops.checkout().iter().map(String::as_str).collect();
        for batch in checkout.chunks(self.batch_size) {
            let mut args = vec!["checkout", head_commit, "--"];
            args.extend_from_slice(batch);
            git.run_with_env(args, &env).await?;
        }

        Ok(())
    }

    async fn commit(&self, git: &Git, message: &str) -> Result<String> {
        let env = [
            ("GIT_AUTHOR_NAME", self.author_name.as_str()),
            ("GIT_AUTHOR_EMAIL", self.author_email.as_str()),
            ("GIT_COMMITTER_NAME", self.author_name.as_str()),
            ("GIT_COMMITTER_EMAIL", self.author_email.as_str()),
        ];
        git.run_with_env(
            [
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "--no-verify",
                "--allow-empty",
                "-m",
                message,
            ],
            &env,
        )
        .await?;
        git.rev_parse("HEAD").await
    }
}

/// Builds a slice commit pair with default identity and batch size.
pub async fn create_head_slice_commits(
    tree: &mut ScratchWorktree,
    base_ref: &str,
    head_commit: &str,
    ops: &ChangeOps,
    slice_paths: &[String],
    label: &str,
) -> Result<SliceCommitPair> {
    SliceCommitter::default()
        .create_head_slice_commits(tree, base_ref, head_commit, ops, slice_paths, label)
        .await
}

fn short(sha: &str) -> &str {
    sha.get(..10).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support::*;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        git: Git,
        base: String,
        head: String,
    }

    /// base: a/keep, a/edit, c/old, d/moved, e/gone
    /// head: a/edit changed, b/new added, c/old deleted, d/moved -> f/moved, e/gone deleted
    async fn fixture() -> Fixture {
        let (dir, git) = init_repo().await;
        let root = dir.path();
        write(root, "a/keep.txt", "keep\n");
        write(root, "a/edit.txt", "before\n");
        write(root, "c/old.txt", "old\n");
        write(root, "d/moved.txt", "a file with enough content to be detected as a rename\n");
        write(root, "e/gone.txt", "gone\n");
        let base = commit_all(&git, "base").await;

        write(root, "a/edit.txt", "after\n");
        write(root, "b/new.txt", "new\n");
        std::fs::remove_file(root.join("c/old.txt")).unwrap();
        std::fs::remove_file(root.join("e/gone.txt")).unwrap();
        std::fs::create_dir_all(root.join("f")).unwrap();
        std::fs::rename(root.join("d/moved.txt"), root.join("f/moved.txt")).unwrap();
        let head = commit_all(&git, "head").await;

        Fixture { dir, git, base, head }
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn check_slice(fx: &Fixture, slice: &[&str]) {
        let ops = fx.git.change_ops(&fx.base, &fx.head).await.unwrap();
        let mut tree = ScratchWorktree::create(&fx.git, &fx.base).await.unwrap();
        let slice = paths(slice);

        let pair = create_head_slice_commits(&mut tree, &fx.base, &fx.head, &ops, &slice, "test")
            .await
            .unwrap();

        assert_eq!(
            fx.git.tree_of(&pair.head).await.unwrap(),
            fx.git.tree_of(&fx.head).await.unwrap()
        );
        let touched = fx.git.changed_paths(&pair.base, &pair.head).await.unwrap();
        let touched: BTreeSet<String> = touched.into_iter().collect();
        let expected: BTreeSet<String> = slice
            .iter()
            .filter(|p| ops.checkout().contains(*p) || ops.remove().contains(*p))
            .cloned()
            .collect();
        assert_eq!(touched, expected);
        assert_eq!(tree.git().rev_parse("HEAD").await.unwrap(), pair.head);

        let author = fx
            .git
            .run(["log", "-1", "--format=%an <%ae>", pair.base.as_str()])
            .await
            .unwrap();
        assert_eq!(author.trim(), "revslice <revslice@localhost>");

        tree.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_slice_diff_is_isolated() {
        if !git_available() {
            return;
        }
        let fx = fixture().await;

        check_slice(&fx, &["b/new.txt", "c/old.txt"]).await;
        check_slice(&fx, &["a/edit.txt"]).await;
        // Only the rename destination: the source is deleted in the base commit.
        check_slice(&fx, &["f/moved.txt"]).await;
        check_slice(&fx, &["d/moved.txt", "f/moved.txt", "e/gone.txt"]).await;
        check_slice(&fx, &[]).await;
        assert!(fx.dir.path().exists());
    }

    /// A single path that is a file on one side and a directory on the other.
    async fn file_dir_fixture(file_in_base: bool) -> Fixture {
        let (dir, git) = init_repo().await;
        let root = dir.path();
        write(root, "keep.txt", "keep\n");
        if file_in_base {
            write(root, "x", "plain file\n");
        } else {
            write(root, "x/y", "nested entry with other text\n");
        }
        let base = commit_all(&git, "base").await;

        if file_in_base {
            std::fs::remove_file(root.join("x")).unwrap();
            write(root, "x/y", "nested entry with other text\n");
        } else {
            std::fs::remove_dir_all(root.join("x")).unwrap();
            write(root, "x", "plain file\n");
        }
        let head = commit_all(&git, "head").await;

        Fixture { dir, git, base, head }
    }

    #[tokio::test]
    async fn test_file_and_directory_swaps_keep_head_tree() {
        if !git_available() {
            return;
        }
        for file_in_base in [true, false] {
            let fx = file_dir_fixture(file_in_base).await;
            let ops = fx.git.change_ops(&fx.base, &fx.head).await.unwrap();
            let head_tree = fx.git.tree_of(&fx.head).await.unwrap();

            for slice in [&["x"][..], &["x/y"][..], &["x", "x/y"][..]] {
                let mut tree = ScratchWorktree::create(&fx.git, &fx.base).await.unwrap();
                let pair =
                    create_head_slice_commits(&mut tree, &fx.base, &fx.head, &ops, &paths(slice), "x")
                        .await
                        .unwrap();

                assert_eq!(
                    fx.git.tree_of(&pair.head).await.unwrap(),
                    head_tree,
                    "file_in_base={file_in_base} slice={slice:?}"
                );
                let touched = fx.git.changed_paths(&pair.base, &pair.head).await.unwrap();
                assert!(
                    touched.iter().all(|p| slice.contains(&p.as_str())),
                    "file_in_base={file_in_base} slice={slice:?} touched={touched:?}"
                );
                tree.remove().await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_small_batches_give_same_result() {
        if !git_available() {
            return;
        }
        let fx = fixture().await;
        let ops = fx.git.change_ops(&fx.base, &fx.head).await.unwrap();
        let committer = SliceCommitter::from_config(&SliceConfig {
            batch_size: 1,
            ..SliceConfig::default()
        });
        let mut tree = ScratchWorktree::create(&fx.git, &fx.base).await.unwrap();

        let pair = committer
            .create_head_slice_commits(&mut tree, &fx.base, &fx.head, &ops, &paths(&["b/new.txt"]), "b")
            .await
            .unwrap();

        assert_eq!(
            fx.git.tree_of(&pair.head).await.unwrap(),
            fx.git.tree_of(&fx.head).await.unwrap()
        );
        assert_eq!(
            fx.git.changed_paths(&pair.base, &pair.head).await.unwrap(),
            vec!["b/new.txt"]
        );
        tree.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_refs_rejected() {
        if !git_available() {
            return;
        }
        let fx = fixture().await;
        let ops = ChangeOps::new();
        let mut tree = ScratchWorktree::create(&fx.git, &fx.base).await.unwrap();

        let err = create_head_slice_commits(&mut tree, "", &fx.head, &ops, &[], "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = create_head_slice_commits(&mut tree, "no-such-ref", &fx.head, &ops, &[], "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Git { .. }));
        tree.remove().await.unwrap();
    }
}
