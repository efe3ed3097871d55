//! Build system for LLVM toolchain configurations
//!
//! This module provides the build functionality for llvmbuild, including:
//! - Static configure and make profiles per component and flavor
//! - The per-task configure, build, install and check pipeline
//! - Parallel execution with progress display
//! - The JSON build report

mod builder;
mod command_logger;
mod environment;
mod parallel;
mod pipeline;
mod profile;
mod progress;
mod progress_writer;
mod report;

pub use builder::Builder;
pub use command_logger::{CommandOutcome, LogCallback, OUTPUT_TAIL_LINES, run_command_with_logging};
pub use environment::{
    StepContext, compute_configure_args, compute_configure_environment, compute_make_environment,
};
pub use parallel::{JobPartition, ParallelExecutor, partition_jobs};
pub use pipeline::{BuildPipeline, ComponentPlan, TaskPlan, needs_configure};
pub use profile::{ConfigureArg, EnvValue, PathRef, StepSpec, step_spec};
pub use progress::BuildProgress;
pub use progress_writer::{ProgressWriter, make_writer, multi_progress};
pub use report::{BuildReport, ComponentOutcome, ComponentReport, REPORT_FILE, Stage, TaskReport};
