use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;

use commands::{chunks, review, slice_commit, slices, Overrides};

#[derive(Parser)]
#[command(name = "revslice")]
#[command(version, about = "Split large changes into size-bounded review jobs", long_about = None)]
struct Cli {
    /// Repository to operate on
    #[arg(short = 'C', long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Config file (defaults to .revslice.toml in the repository)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan size-bounded chunks over the commits in base..head
    Chunks {
        base: String,
        head: String,

        /// Maximum files per chunk
        #[arg(long)]
        max_files: Option<usize>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plan directory-coherent slices over the files changed in base..head
    Slices {
        base: String,
        head: String,

        /// Maximum files per slice
        #[arg(long)]
        max_files: Option<usize>,

        /// Deepest directory level used to split large groups
        #[arg(long)]
        max_depth: Option<usize>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build one head-sliced commit pair in an existing worktree
    SliceCommit {
        base: String,
        head: String,

        /// Worktree to build the commits in (its checkout is overwritten)
        #[arg(long)]
        worktree: PathBuf,

        /// Label used in the commit messages
        #[arg(long, default_value = "slice")]
        label: String,

        /// Paths belonging to the slice
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run a review command once per chunk or slice
    Review {
        base: String,
        head: String,

        /// Shell command to run per job; sees REVSLICE_BASE, REVSLICE_HEAD,
        /// REVSLICE_LABEL, REVSLICE_INDEX, REVSLICE_FILES
        #[arg(long)]
        exec: String,

        /// Split by commits or by changed paths
        #[arg(long, value_enum, default_value_t = review::Mode::Slices)]
        mode: review::Mode,

        /// Maximum files per job
        #[arg(long)]
        max_files: Option<usize>,

        /// Deepest directory level used to split large groups
        #[arg(long)]
        max_depth: Option<usize>,

        /// Jobs to run at once after the first
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Write a JSON report of the run
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let repo = cli.repo;
    let config = cli.config;

    match cli.command {
        Commands::Chunks {
            base,
            head,
            max_files,
            json,
        } => {
            let overrides = Overrides {
                max_files,
                ..Overrides::default()
            };
            let ctx = commands::load_context(repo, config, overrides)?;
            chunks::run(&ctx, &base, &head, json).await?;
        }
        Commands::Slices {
            base,
            head,
            max_files,
            max_depth,
            json,
        } => {
            let overrides = Overrides {
                max_files,
                max_depth,
                ..Overrides::default()
            };
            let ctx = commands::load_context(repo, config, overrides)?;
            slices::run(&ctx, &base, &head, json).await?;
        }
        Commands::SliceCommit {
            base,
            head,
            worktree,
            label,
            paths,
        } => {
            let ctx = commands::load_context(repo, config, Overrides::default())?;
            slice_commit::run(&ctx, &base, &head, worktree, &label, paths).await?;
        }
        Commands::Review {
            base,
            head,
            exec,
            mode,
            max_files,
            max_depth,
            concurrency,
            report,
        } => {
            let overrides = Overrides {
                max_files,
                max_depth,
                concurrency,
            };
            let ctx = commands::load_context(repo, config, overrides)?;
            review::run(&ctx, &base, &head, &exec, mode, report).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
