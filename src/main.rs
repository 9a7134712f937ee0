//! Callweave CLI entry point

use callweave::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "callweave")]
#[command(about = "Incremental call graphs for Java projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

/// Which part of the project to show. Whole project when none is given.
#[derive(Args, Clone, Default)]
pub struct ScopeArgs {
    /// Leave test sources out of the graph
    #[arg(long)]
    pub no_tests: bool,

    /// Only the transitive callers and callees of the methods this selects:
    /// `Type::name`, a full signature, or a method id
    #[arg(long, value_name = "SELECTOR", conflicts_with_all = ["module", "dir", "unit"])]
    pub focus: Option<String>,

    /// Only units under this top-level module directory
    #[arg(long, conflicts_with_all = ["dir", "unit"])]
    pub module: Option<String>,

    /// Only units under this directory
    #[arg(long, conflicts_with = "unit")]
    pub dir: Option<PathBuf>,

    /// Only these units (paths relative to the root), repeatable
    #[arg(long)]
    pub unit: Vec<String>,
}

#[derive(Args, Clone)]
pub struct OutputArgs {
    /// Graph format (defaults to the configured one)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write the graph to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the call graph once and print it
    Build {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Rebuild the call graph whenever sources change
    Watch {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print every call edge as caller/callee pairs
    Dump,
    /// Clear the cache
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("callweave={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Callweave v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Project root: {}", cli.root.display());

    match cli.command {
        Commands::Build { scope, output } => commands::build(cli.root, scope, output),
        Commands::Watch { scope, output } => commands::watch(cli.root, scope, output).await,
        Commands::Dump => commands::dump(cli.root),
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("Callweave v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
