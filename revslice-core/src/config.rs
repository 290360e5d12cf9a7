use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = ".revslice.toml";

/// Limits and identities shared by the planners, the slice commit
/// constructor and the job runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceConfig {
    /// Maximum changed files per chunk or slice.
    pub max_files: usize,
    /// Deepest directory level used when splitting an oversized group.
    pub max_prefix_depth: usize,
    /// Directory depth shown in the label of a single all-paths slice.
    pub label_depth: usize,
    /// Jobs in flight after the probe job.
    pub concurrency: usize,
    /// Paths per `git rm` / `git checkout` invocation.
    pub batch_size: usize,
    pub author_name: String,
    pub author_email: String,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            max_files: 100,
            max_prefix_depth: 4,
            label_depth: 3,
            concurrency: 4,
            batch_size: 150,
            author_name: "revslice".to_string(),
            author_email: "revslice@localhost".to_string(),
        }
    }
}

impl SliceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SliceConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads `.revslice.toml` from `repo_dir` if it exists, defaults otherwise.
    pub fn discover<P: AsRef<Path>>(repo_dir: P) -> Result<Self> {
        let path = repo_dir.as_ref().join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_files", self.max_files),
            ("max_prefix_depth", self.max_prefix_depth),
            ("label_depth", self.label_depth),
            ("concurrency", self.concurrency),
            ("batch_size", self.batch_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::invalid(format!("{name} must be positive")));
            }
        }
        if self.author_name.trim().is_empty() || self.author_email.trim().is_empty() {
            return Err(Error::invalid("author identity must not be empty"));
        }
        Ok(())
    }
}
