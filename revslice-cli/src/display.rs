use colored::Colorize;
use revslice_core::{Chunk, Slice};

pub fn short(sha: &str) -> &str {
    sha.get(..10).unwrap_or(sha)
}

pub fn print_chunk(index: usize, chunk: &Chunk, max_files: usize) {
    let count = format!("{} files", chunk.file_count);
    let count = if chunk.over_limit {
        format!("{} (over limit {})", count, max_files).red()
    } else {
        count.green()
    };
    println!(
        "  {:>3}. {}..{}  {}",
        index + 1,
        short(&chunk.base).dimmed(),
        short(&chunk.head).cyan(),
        count
    );
}

pub fn print_slice(index: usize, slice: &Slice, show_paths: usize) {
    println!(
        "  {:>3}. {} {}",
        index + 1,
        slice.label.bold(),
        format!("({} files)", slice.len()).yellow()
    );
    for path in slice.paths.iter().take(show_paths) {
        println!("         {}", path.dimmed());
    }
    if slice.len() > show_paths {
        println!("         {} and {} more", "...".dimmed(), slice.len() - show_paths);
    }
}
