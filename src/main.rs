//! Quill CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Incremental build cache for derived project files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Source root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize an artifact and print where it landed
    Fetch {
        /// Logical path of the artifact, relative to the source root
        path: String,

        /// Serve a stale cache entry instead of re-running its generator
        #[arg(long)]
        use_stale: bool,
    },
    /// Print a cache-busting hash for a logical path
    Hash {
        /// Logical path, relative to the source root
        path: String,

        /// Hash the transitive module graph instead of the single source
        #[arg(short, long)]
        module: bool,
    },
    /// Clear the cache
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("quill={}", log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Fetch { path, use_stale } => {
            commands::fetch(cli.root, path, use_stale).await
        }
        Commands::Hash { path, module } => {
            commands::hash(cli.root, path, module)
        }
        Commands::Clear => {
            commands::clear(cli.root)
        }
        Commands::Version => {
            println!("Quill v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
