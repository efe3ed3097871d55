//! llvmbuild CLI - builds a matrix of LLVM toolchain configurations

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use llvmbuild::build::make_writer;
use llvmbuild::commands;

/// llvmbuild - builds a matrix of LLVM toolchain configurations
#[derive(Debug, Parser)]
#[command(name = "llvmbuild")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding llvmbuild.toml; relative paths resolve against it
    #[arg(short = 'w', long, global = true)]
    workdir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Configure, build, install and check every configuration
    Build(commands::build::BuildArgs),

    /// Show what build would run without running it
    Plan(commands::plan::PlanArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Log lines are written above the progress bars
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(make_writer()))
        .with(filter)
        .init();

    let workdir = match cli.workdir {
        Some(ref path) => camino::Utf8PathBuf::from(path),
        None => std::env::current_dir()
            .into_diagnostic()
            .and_then(|p| camino::Utf8PathBuf::try_from(p).into_diagnostic())?,
    };

    match cli.command {
        Commands::Build(args) => commands::build::run(&workdir, args),
        Commands::Plan(args) => commands::plan::run(&workdir, args),
    }
}
