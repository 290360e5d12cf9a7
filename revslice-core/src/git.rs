//! Thin async wrapper over the `git` binary.

use crate::chunks::FileCountOracle;
use crate::error::{Error, Result};
use crate::models::{ChangeKind, ChangeOps};
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A repository or worktree directory that git commands run in.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Runs `git <args>` and returns stdout.
    ///
    /// Crate-private: outside callers only get the query methods below, so a
    /// shared `&Git` cannot change a leased worktree.
    pub(crate) async fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_with_env(args, &[]).await
    }

    pub(crate) async fn run_with_env<I, S>(&self, args: I, env: &[(&str, &str)]) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.dir)
            .args(&args)
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .output()
            .await?;

        let command = || {
            args.iter()
                .take(3)
                .map(|a| a.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        };
        if !output.status.success() {
            return Err(Error::Git {
                command: command(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        decode_stdout(&command(), output.stdout)
    }

    /// Resolves `rev` to a full commit id.
    pub async fn rev_parse(&self, rev: &str) -> Result<String> {
        let spec = format!("{rev}^{{commit}}");
        let out = self.run(["rev-parse", "--verify", "--quiet", spec.as_str()]).await?;
        Ok(out.trim().to_string())
    }

    pub async fn tree_of(&self, rev: &str) -> Result<String> {
        let spec = format!("{rev}^{{tree}}");
        let out = self.run(["rev-parse", "--verify", spec.as_str()]).await?;
        Ok(out.trim().to_string())
    }

    /// Commits in `base..head`, oldest first.
    pub async fn rev_list(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let range = format!("{base}..{head}");
        let out = self.run(["rev-list", "--reverse", range.as_str()]).await?;
        Ok(out.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    /// Paths touched between two revisions, without rename pairing.
    pub async fn changed_paths(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let out = self
            .run(["diff", "--no-ext-diff", "--no-renames", "--name-only", "-z", base, head])
            .await?;
        Ok(split_nul(&out).map(str::to_string).collect())
    }

    pub async fn count_files_between(&self, base: &str, head: &str) -> Result<usize> {
        let out = self
            .run(["diff", "--no-ext-diff", "--name-only", "-z", base, head])
            .await?;
        let count = split_nul(&out).count();
        debug!("{}..{} touches {} files", base, head, count);
        Ok(count)
    }

    /// Which of `paths` are index entries, matched exactly rather than as
    /// directory prefixes.
    pub async fn tracked_paths(&self, paths: &[&str]) -> Result<BTreeSet<String>> {
        if paths.is_empty() {
            return Ok(BTreeSet::new());
        }
        let mut args = vec!["ls-files", "-z", "--"];
        args.extend_from_slice(paths);
        let out = self
            .run_with_env(args, &[("GIT_LITERAL_PATHSPECS", "1")])
            .await?;
        let listed: BTreeSet<&str> = split_nul(&out).collect();
        Ok(paths
            .iter()
            .filter(|p| listed.contains(**p))
            .map(|p| p.to_string())
            .collect())
    }

    /// Decomposes `base..head` into checkout and remove sets, with rename detection.
    pub async fn change_ops(&self, base: &str, head: &str) -> Result<ChangeOps> {
        let out = self
            .run(["diff", "--no-ext-diff", "--name-status", "-M", "-z", base, head])
            .await?;
        parse_name_status(&out)
    }
}

impl FileCountOracle for Git {
    async fn count_files_between(&self, base: &str, head: &str) -> Result<usize> {
        Git::count_files_between(self, base, head).await
    }
}

/// Decodes git stdout, naming the offending entry when it is not UTF-8.
fn decode_stdout(command: &str, stdout: Vec<u8>) -> Result<String> {
    String::from_utf8(stdout).map_err(|e| {
        let bytes = e.as_bytes();
        let at = e.utf8_error().valid_up_to();
        let start = bytes[..at]
            .iter()
            .rposition(|b| matches!(b, b'\0' | b'\n'))
            .map_or(0, |i| i + 1);
        let end = bytes[at..]
            .iter()
            .position(|b| matches!(b, b'\0' | b'\n'))
            .map_or(bytes.len(), |i| at + i);
        Error::ParseFailed(format!(
            "git {command} printed a non-UTF-8 path {:?} (byte 0x{:02x} at offset {at})",
            String::from_utf8_lossy(&bytes[start..end]),
            bytes[at]
        ))
    })
}

fn split_nul(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\0').filter(|s| !s.is_empty())
}

/// Parses `git diff --name-status -z` output.
pub fn parse_name_status(raw: &str) -> Result<ChangeOps> {
    let mut ops = ChangeOps::new();
    let mut fields = split_nul(raw);

    while let Some(status) = fields.next() {
        let status = status.trim();
        let kind = ChangeKind::parse(status)
            .ok_or_else(|| Error::ParseFailed(format!("unknown status '{status}'")))?;
        let missing = || Error::ParseFailed(format!("status '{status}' without a path"));

        if kind.has_source() {
            let source = fields.next().ok_or_else(missing)?;
            let dest = fields.next().ok_or_else(missing)?;
            ops.record(kind, dest, Some(source));
        } else {
            let path = fields.next().ok_or_else(missing)?;
            ops.record(kind, path, None);
        }
    }

    Ok(ops)
}
