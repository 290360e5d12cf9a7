pub mod chunks;
pub mod review;
pub mod slice_commit;
pub mod slices;

use anyhow::{Context as _, Result};
use revslice_core::{Git, SliceConfig};
use std::path::PathBuf;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub max_files: Option<usize>,
    pub max_depth: Option<usize>,
    pub concurrency: Option<usize>,
}

pub struct Context {
    pub git: Git,
    pub config: SliceConfig,
}

pub fn load_context(
    repo: PathBuf,
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<Context> {
    let repo = std::fs::canonicalize(&repo)
        .with_context(|| format!("Repository {:?} not found", repo))?;

    let mut config = match config_path {
        Some(path) => SliceConfig::load(&path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => SliceConfig::discover(&repo)?,
    };
    apply_overrides(&mut config, overrides);
    config.validate()?;

    Ok(Context {
        git: Git::open(repo),
        config,
    })
}

fn apply_overrides(config: &mut SliceConfig, overrides: Overrides) {
    if let Some(max_files) = overrides.max_files {
        config.max_files = max_files;
    }
    if let Some(depth) = overrides.max_depth {
        config.max_prefix_depth = depth;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.concurrency = concurrency;
    }
}

/// Resolves `base` and `head` to full commit ids.
pub async fn resolve_range(git: &Git, base: &str, head: &str) -> Result<(String, String)> {
    let base_id = git
        .rev_parse(base)
        .await
        .with_context(|| format!("Unknown base revision '{}'", base))?;
    let head_id = git
        .rev_parse(head)
        .await
        .with_context(|| format!("Unknown head revision '{}'", head))?;
    Ok((base_id, head_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".revslice.toml"),
            "max_files = 40\nconcurrency = 8\n",
        )
        .unwrap();

        let overrides = Overrides {
            max_files: Some(12),
            ..Overrides::default()
        };
        let ctx = load_context(dir.path().to_path_buf(), None, overrides).unwrap();

        assert_eq!(ctx.config.max_files, 12);
        assert_eq!(ctx.config.concurrency, 8);
    }

    #[test]
    fn test_zero_override_rejected() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides {
            concurrency: Some(0),
            ..Overrides::default()
        };
        assert!(load_context(dir.path().to_path_buf(), None, overrides).is_err());
    }
}
