use super::{resolve_range, Context};
use crate::display::short;
use anyhow::{Context as _, Result};
use colored::Colorize;
use revslice_core::{ScratchWorktree, SliceCommitter};
use std::path::PathBuf;

pub async fn run(
    ctx: &Context,
    base: &str,
    head: &str,
    worktree: PathBuf,
    label: &str,
    paths: Vec<String>,
) -> Result<()> {
    let (base, head) = resolve_range(&ctx.git, base, head).await?;
    let ops = ctx.git.change_ops(&base, &head).await?;

    let unknown: Vec<&String> = paths
        .iter()
        .filter(|p| !ops.checkout().contains(*p) && !ops.remove().contains(*p))
        .collect();
    for path in &unknown {
        println!("  {} {} is not changed in this range", "!".yellow(), path);
    }

    let mut tree = ScratchWorktree::attach(&ctx.git, &worktree)?;
    let pair = SliceCommitter::from_config(&ctx.config)
        .create_head_slice_commits(&mut tree, &base, &head, &ops, &paths, label)
        .await
        .with_context(|| format!("Failed to build slice commits in {:?}", worktree))?;

    println!("{}", "✓ Slice commits created".green().bold());
    println!("  {}: {}", "Base".bold(), pair.base);
    println!("  {}: {}", "Head".bold(), pair.head);
    println!(
        "  {}: git diff {}..{}",
        "Review".bold(),
        short(&pair.base),
        short(&pair.head)
    );

    Ok(())
}
