use super::{resolve_range, Context};
use crate::display;
use anyhow::Result;
use colored::Colorize;
use revslice_core::SlicePlanner;

pub async fn run(ctx: &Context, base: &str, head: &str, json: bool) -> Result<()> {
    let (base, head) = resolve_range(&ctx.git, base, head).await?;
    let ops = ctx.git.change_ops(&base, &head).await?;
    let slices = SlicePlanner::from_config(&ctx.config).plan(&ops.all())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&slices)?);
        return Ok(());
    }

    if slices.is_empty() {
        println!("{}", "No changed files between base and head".yellow());
        return Ok(());
    }

    println!(
        "{} {}",
        "Path slices".bold().cyan(),
        format!(
            "({} files: {} to check out, {} to remove; max {} per slice)",
            ops.len(),
            ops.checkout().len(),
            ops.remove().len(),
            ctx.config.max_files
        )
        .dimmed()
    );
    for (i, slice) in slices.iter().enumerate() {
        display::print_slice(i, slice, 5);
    }

    Ok(())
}
