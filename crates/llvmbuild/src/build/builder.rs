//! Build orchestration
//!
//! This module provides the supervisor of a run that:
//! - Splits the job budget across workers
//! - Runs every task of the matrix through the pipeline
//! - Collects task reports and writes the build report

use chrono::Utc;
use std::sync::Arc;

use crate::Result;
use crate::matrix::BuildMatrix;

use super::parallel::{ParallelExecutor, partition_jobs};
use super::pipeline::BuildPipeline;
use super::progress::BuildProgress;
use super::progress_writer::multi_progress;
use super::report::{BuildReport, REPORT_FILE};

/// Supervisor of a build run
pub struct Builder<'a> {
    matrix: &'a BuildMatrix,
    show_progress: bool,
}

impl<'a> Builder<'a> {
    pub fn new(matrix: &'a BuildMatrix) -> Self {
        Self {
            matrix,
            show_progress: true,
        }
    }

    /// Do not draw progress bars
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Run every task and write the report.
    ///
    /// Failed tasks do not make this return an error; inspect the report.
    pub fn build(&self) -> Result<BuildReport> {
        let config = &self.matrix.config;
        let tasks = self.matrix.tasks.clone();
        let started_at = Utc::now();

        tracing::info!(
            "Building {} configurations of {:?}",
            tasks.len(),
            config.components.iter().map(|c| c.name()).collect::<Vec<_>>()
        );

        let partition = partition_jobs(config.jobs, config.threads);
        tracing::info!(
            "Using {} workers with {} make jobs each",
            partition.workers,
            partition.jobs_per_worker
        );

        let progress = if self.show_progress {
            BuildProgress::new_with_multi_progress(tasks.len(), multi_progress().clone())
        } else {
            BuildProgress::hidden(tasks.len())
        };

        let abbrevs = Arc::new(self.matrix.abbrevs.clone());
        let pipeline = Arc::new(BuildPipeline::new(Arc::new(config.clone()), abbrevs.clone()));
        let executor = ParallelExecutor::new(partition, abbrevs);

        let reports = executor.execute(tasks, &progress, move |task, jobs, log_callback| {
            let pipeline = pipeline.clone();
            async move { pipeline.run(&task, jobs, Some(log_callback)).await }
        })?;

        let report = BuildReport::new(started_at, reports);
        progress.finish(report.failed_count());

        let report_path = config.build_root.join(REPORT_FILE);
        report.write(&report_path)?;
        tracing::info!("Build report written to {}", report_path);

        report.log_summary();
        Ok(report)
    }
}
