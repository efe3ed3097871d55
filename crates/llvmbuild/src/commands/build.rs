//! Build command implementation
//!
//! This module provides the CLI interface for building the matrix.

use camino::Utf8Path;
use clap::Args;
use miette::{Result, miette};

use crate::build::Builder;

use super::MatrixArgs;

/// Arguments for the build command
#[derive(Debug, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub matrix: MatrixArgs,

    /// Do not draw progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Run the build command
pub fn run(workdir: &Utf8Path, args: BuildArgs) -> Result<()> {
    let matrix = super::load_matrix(workdir, args.matrix)?;

    let mut builder = Builder::new(&matrix);
    if args.no_progress {
        builder = builder.without_progress();
    }
    let report = builder.build()?;

    let failed = report.failed_count();
    if failed > 0 {
        return Err(miette!(
            help = "See the log above or llvmbuild-report.json in the build directory",
            "{} of {} configurations failed",
            failed,
            report.tasks.len()
        ));
    }

    Ok(())
}
