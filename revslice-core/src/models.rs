use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One entry of a name-status diff between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    TypeChanged,
    Deleted,
    Renamed,
    Copied,
}

impl ChangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeKind::Added => "A",
            ChangeKind::Modified => "M",
            ChangeKind::TypeChanged => "T",
            ChangeKind::Deleted => "D",
            ChangeKind::Renamed => "R",
            ChangeKind::Copied => "C",
        }
    }

    /// Parses a status field such as `M`, `R087` or `C100`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.chars().next()? {
            'A' => Some(ChangeKind::Added),
            'M' => Some(ChangeKind::Modified),
            'T' => Some(ChangeKind::TypeChanged),
            'D' => Some(ChangeKind::Deleted),
            'R' => Some(ChangeKind::Renamed),
            'C' => Some(ChangeKind::Copied),
            _ => None,
        }
    }

    /// Rename and copy records carry a source and a destination path.
    pub fn has_source(&self) -> bool {
        matches!(self, ChangeKind::Renamed | ChangeKind::Copied)
    }
}

/// The checkout/remove decomposition of a full base..head diff.
///
/// `checkout` holds paths whose final content comes from head; `remove` holds
/// paths that must not exist at head. The two sets never overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOps {
    checkout: BTreeSet<String>,
    remove: BTreeSet<String>,
}

impl ChangeOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one name-status entry. `source` is only read for renames and copies.
    pub fn record(&mut self, kind: ChangeKind, path: &str, source: Option<&str>) {
        match kind {
            ChangeKind::Added | ChangeKind::Modified | ChangeKind::TypeChanged => {
                self.add_checkout(path);
            }
            ChangeKind::Deleted => self.add_remove(path),
            ChangeKind::Renamed => {
                if let Some(source) = source {
                    self.add_remove(source);
                }
                self.add_checkout(path);
            }
            ChangeKind::Copied => self.add_checkout(path),
        }
    }

    pub fn with_checkout(mut self, path: &str) -> Self {
        self.add_checkout(path);
        self
    }

    pub fn with_remove(mut self, path: &str) -> Self {
        self.add_remove(path);
        self
    }

    fn add_checkout(&mut self, path: &str) {
        // A path that is written at head is never also deleted.
        self.remove.remove(path);
        self.checkout.insert(path.to_string());
    }

    fn add_remove(&mut self, path: &str) {
        if !self.checkout.contains(path) {
            self.remove.insert(path.to_string());
        }
    }

    pub fn checkout(&self) -> &BTreeSet<String> {
        &self.checkout
    }

    pub fn remove(&self) -> &BTreeSet<String> {
        &self.remove
    }

    /// `checkout ∪ remove`, sorted.
    pub fn all(&self) -> Vec<String> {
        self.checkout.union(&self.remove).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.checkout.len() + self.remove.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkout.is_empty() && self.remove.is_empty()
    }

    /// Splits into (slice, rest) according to membership in `slice_paths`.
    pub fn partition(&self, slice_paths: &BTreeSet<String>) -> (ChangeOps, ChangeOps) {
        let mut inside = ChangeOps::new();
        let mut outside = ChangeOps::new();
        for path in &self.checkout {
            let target = if slice_paths.contains(path) { &mut inside } else { &mut outside };
            target.checkout.insert(path.clone());
        }
        for path in &self.remove {
            let target = if slice_paths.contains(path) { &mut inside } else { &mut outside };
            target.remove.insert(path.clone());
        }
        (inside, outside)
    }
}

/// One incremental review step over a commit sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub base: String,
    pub head: String,
    pub file_count: usize,
    pub over_limit: bool,
}

impl Chunk {
    pub fn new(base: impl Into<String>, head: impl Into<String>, file_count: usize) -> Self {
        Self {
            base: base.into(),
            head: head.into(),
            file_count,
            over_limit: false,
        }
    }

    pub fn forced(base: impl Into<String>, head: impl Into<String>, file_count: usize) -> Self {
        Self {
            over_limit: true,
            ..Self::new(base, head, file_count)
        }
    }
}

/// A bounded group of changed paths reviewed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub label: String,
    pub paths: Vec<String>,
}

impl Slice {
    pub fn new(label: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            label: label.into(),
            paths,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Two synthetic commits isolating one slice's diff. `head` has the exact
/// tree of the reviewed head commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceCommitPair {
    pub base: String,
    pub head: String,
}

/// Result of one sliced job. `Abort` from the probe job stops the run before
/// any other job starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome<T> {
    Continue(T),
    Abort(T),
}

impl<T> JobOutcome<T> {
    pub fn is_abort(&self) -> bool {
        matches!(self, JobOutcome::Abort(_))
    }

    pub fn value(&self) -> &T {
        match self {
            JobOutcome::Continue(v) | JobOutcome::Abort(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            JobOutcome::Continue(v) | JobOutcome::Abort(v) => v,
        }
    }
}
