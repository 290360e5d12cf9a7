//! Groups changed paths into size-bounded, directory-coherent slices.

use crate::config::SliceConfig;
use crate::error::{Error, Result};
use crate::models::Slice;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Label used when paths share no directory.
pub const ROOT_LABEL: &str = ".";

pub const DEFAULT_LABEL_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlicePlanner {
    pub max_files: usize,
    pub max_prefix_depth: usize,
    pub label_depth: usize,
}

impl SlicePlanner {
    pub fn new(max_files: usize, max_prefix_depth: usize) -> Self {
        Self {
            max_files,
            max_prefix_depth,
            label_depth: DEFAULT_LABEL_DEPTH,
        }
    }

    pub fn from_config(config: &SliceConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_prefix_depth: config.max_prefix_depth,
            label_depth: config.label_depth,
        }
    }

    pub fn with_label_depth(mut self, depth: usize) -> Self {
        self.label_depth = depth;
        self
    }

    /// Partitions the deduplicated `changed_paths` into slices of at most
    /// `max_files` paths each.
    pub fn plan<S: AsRef<str>>(&self, changed_paths: &[S]) -> Result<Vec<Slice>> {
        if self.max_files == 0 {
            return Err(Error::invalid("max_files must be positive"));
        }
        if self.max_prefix_depth == 0 {
            return Err(Error::invalid("max_prefix_depth must be positive"));
        }

        let paths: Vec<String> = changed_paths
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if paths.is_empty() {
            return Ok(Vec::new());
        }

        if paths.len() <= self.max_files {
            let mut label = common_dir_prefix(&paths);
            label.truncate(self.label_depth);
            return Ok(vec![Slice::new(display_label(&label.join("/")), paths)]);
        }

        let mut top_groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in paths {
            top_groups.entry(prefix_key(&path, 1)).or_default().push(path);
        }

        let mut slices = Vec::new();
        for (top, group) in top_groups {
            if group.len() <= self.max_files {
                slices.push(Slice::new(display_label(&top), group));
                continue;
            }
            let refined = self.refine(&top, group);
            debug!("{} split into {} groups", display_label(&top), refined.len());
            self.pack(&top, refined, &mut slices);
        }

        Ok(slices)
    }

    /// Splits an oversized group by successively deeper directory prefixes.
    fn refine(&self, top: &str, group: Vec<String>) -> Vec<(String, Vec<String>)> {
        let mut groups = vec![(top.to_string(), group)];

        for depth in 2..=self.max_prefix_depth {
            if groups.iter().all(|(_, paths)| paths.len() <= self.max_files) {
                break;
            }
            let mut next = Vec::with_capacity(groups.len());
            for (key, paths) in groups {
                if paths.len() <= self.max_files {
                    next.push((key, paths));
                    continue;
                }
                let mut sub: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for path in paths {
                    sub.entry(prefix_key(&path, depth)).or_default().push(path);
                }
                next.extend(sub);
            }
            groups = next;
        }

        groups
    }

    /// Greedy label-ordered packing of refined groups into slices.
    fn pack(&self, top: &str, mut groups: Vec<(String, Vec<String>)>, out: &mut Vec<Slice>) {
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut labels: Vec<String> = Vec::new();
        let mut bucket: Vec<String> = Vec::new();

        for (label, paths) in groups {
            if paths.len() > self.max_files {
                flush_bucket(top, &mut labels, &mut bucket, out);
                let parts = paths.len().div_ceil(self.max_files);
                warn!(
                    "{} has {} files even at depth {}, splitting into {} batches",
                    display_label(&label),
                    paths.len(),
                    self.max_prefix_depth,
                    parts
                );
                for (i, part) in paths.chunks(self.max_files).enumerate() {
                    let name = format!("{} [{}/{}]", display_label(&label), i + 1, parts);
                    out.push(Slice::new(name, part.to_vec()));
                }
                continue;
            }

            if !bucket.is_empty() && bucket.len() + paths.len() > self.max_files {
                flush_bucket(top, &mut labels, &mut bucket, out);
            }
            labels.push(label);
            bucket.extend(paths);
        }

        flush_bucket(top, &mut labels, &mut bucket, out);
    }
}

/// Plans slices with the default label depth.
pub fn plan_path_slices<S: AsRef<str>>(
    changed_paths: &[S],
    max_files: usize,
    max_prefix_depth: usize,
) -> Result<Vec<Slice>> {
    SlicePlanner::new(max_files, max_prefix_depth).plan(changed_paths)
}

fn flush_bucket(top: &str, labels: &mut Vec<String>, bucket: &mut Vec<String>, out: &mut Vec<Slice>) {
    if bucket.is_empty() {
        return;
    }
    let prefix = common_label_prefix(labels);
    let label = if prefix.is_empty() { top.to_string() } else { prefix };
    let mut paths = std::mem::take(bucket);
    paths.sort();
    out.push(Slice::new(display_label(&label), paths));
    labels.clear();
}

/// Directory segments of `path`, without the file name.
fn dir_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    segments
}

/// The first `depth` directory segments of `path`, joined with `/`.
fn prefix_key(path: &str, depth: usize) -> String {
    dir_segments(path)
        .into_iter()
        .take(depth)
        .collect::<Vec<_>>()
        .join("/")
}

fn common_dir_prefix(paths: &[String]) -> Vec<&str> {
    let mut iter = paths.iter();
    let mut prefix = match iter.next() {
        Some(first) => dir_segments(first),
        None => return Vec::new(),
    };
    for path in iter {
        let segments = dir_segments(path);
        let shared = prefix
            .iter()
            .zip(segments.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(shared);
        if prefix.is_empty() {
            break;
        }
    }
    prefix
}

fn common_label_prefix(labels: &[String]) -> String {
    let mut iter = labels.iter();
    let mut prefix: Vec<&str> = match iter.next() {
        Some(first) => first.split('/').filter(|s| !s.is_empty()).collect(),
        None => return String::new(),
    };
    for label in iter {
        let shared = prefix
            .iter()
            .zip(label.split('/').filter(|s| !s.is_empty()))
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
    }
    prefix.join("/")
}

fn display_label(label: &str) -> String {
    if label.is_empty() {
        ROOT_LABEL.to_string()
    } else {
        label.to_string()
    }
}
