//! # revslice-core
//!
//! Core library for revslice - feeding large changes to size-limited review
//! tools without losing repository context.
//!
//! This crate plans size-bounded commit chunks and path slices, builds the
//! synthetic commit pairs that isolate one slice's diff, and runs the
//! resulting review jobs with a probe job followed by bounded concurrency.

pub mod chunks;
pub mod config;
pub mod error;
pub mod executor;
pub mod git;
pub mod models;
pub mod runner;
pub mod slice_commit;
pub mod slices;
pub mod worktree;

pub use chunks::{plan_commit_chunks, FileCountOracle};
pub use config::SliceConfig;
pub use error::{Error, Result};
pub use executor::run_with_concurrency_limit;
pub use git::Git;
pub use models::{ChangeKind, ChangeOps, Chunk, JobOutcome, Slice, SliceCommitPair};
pub use runner::run_sliced_jobs;
pub use slice_commit::{create_head_slice_commits, SliceCommitter};
pub use slices::{plan_path_slices, SlicePlanner};
pub use worktree::ScratchWorktree;
