//! Splits a linear commit sequence into size-bounded review chunks.
//!
//! Each chunk is grown greedily with a binary search over the remaining
//! commits. The search assumes the file count from a fixed base is
//! non-decreasing as the head advances. A commit that reverts earlier work can
//! break that assumption; the planner then still returns a valid chain, just
//! with more chunks than necessary.

use crate::error::{Error, Result};
use crate::models::Chunk;
use std::future::Future;
use tracing::{debug, info, warn};

/// Answers "how many files differ between `base` and `head`".
pub trait FileCountOracle {
    fn count_files_between(
        &self,
        base: &str,
        head: &str,
    ) -> impl Future<Output = Result<usize>> + Send;
}

/// Plans the chunk chain `base_commit -> ... -> commits.last()`.
///
/// Every commit falls inside exactly one chunk and each chunk starts where
/// the previous one ended. A chunk is `over_limit` only when its single commit
/// already exceeds `max_files`.
pub async fn plan_commit_chunks<O>(
    base_commit: &str,
    commits: &[String],
    max_files: usize,
    oracle: &O,
) -> Result<Vec<Chunk>>
where
    O: FileCountOracle,
{
    if base_commit.trim().is_empty() {
        return Err(Error::invalid("base commit is required"));
    }
    if max_files == 0 {
        return Err(Error::invalid("max_files must be positive"));
    }

    let mut chunks = Vec::new();
    let mut base = base_commit.to_string();
    let mut start = 0;

    while start < commits.len() {
        let mut lo = start;
        let mut hi = commits.len() - 1;
        let mut best: Option<(usize, usize)> = None;
        let mut start_count = None;

        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let count = oracle.count_files_between(&base, &commits[mid]).await?;
            debug!("probe {}..{} = {} files", base, commits[mid], count);
            if mid == start {
                start_count = Some(count);
            }

            if count <= max_files {
                best = Some((mid, count));
                lo = mid + 1;
            } else if mid == start {
                break;
            } else {
                hi = mid - 1;
            }
        }

        let (end, chunk) = match best {
            Some((end, count)) => (end, Chunk::new(base.as_str(), commits[end].as_str(), count)),
            None => {
                let count = match start_count {
                    Some(count) => count,
                    None => oracle.count_files_between(&base, &commits[start]).await?,
                };
                warn!(
                    "commit {} alone touches {} files (limit {})",
                    commits[start], count, max_files
                );
                (start, Chunk::forced(base.as_str(), commits[start].as_str(), count))
            }
        };

        info!(
            "chunk {}: {}..{} ({} files)",
            chunks.len() + 1,
            chunk.base,
            chunk.head,
            chunk.file_count
        );
        base = chunk.head.clone();
        chunks.push(chunk);
        start = end + 1;
    }

    Ok(chunks)
}
