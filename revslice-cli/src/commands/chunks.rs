use super::{resolve_range, Context};
use crate::display;
use anyhow::Result;
use colored::Colorize;
use revslice_core::plan_commit_chunks;

pub async fn run(ctx: &Context, base: &str, head: &str, json: bool) -> Result<()> {
    let (base, head) = resolve_range(&ctx.git, base, head).await?;
    let commits = ctx.git.rev_list(&base, &head).await?;
    let chunks = plan_commit_chunks(&base, &commits, ctx.config.max_files, &ctx.git).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    if chunks.is_empty() {
        println!("{}", "No commits between base and head".yellow());
        return Ok(());
    }

    println!(
        "{} {}",
        "Commit chunks".bold().cyan(),
        format!("({} commits, max {} files)", commits.len(), ctx.config.max_files).dimmed()
    );
    for (i, chunk) in chunks.iter().enumerate() {
        display::print_chunk(i, chunk, ctx.config.max_files);
    }

    let forced = chunks.iter().filter(|c| c.over_limit).count();
    if forced > 0 {
        println!();
        println!(
            "{}",
            format!("⚠ {} commit(s) exceed the limit on their own", forced)
                .yellow()
                .bold()
        );
    }

    Ok(())
}
