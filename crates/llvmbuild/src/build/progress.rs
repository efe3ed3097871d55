//! Progress display for parallel builds
//!
//! This module provides progress bar functionality using indicatif,
//! integrated with tracing for clean log output.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Progress manager for the build matrix.
///
/// Cloning is cheap; all clones drive the same bars.
#[derive(Clone)]
pub struct BuildProgress {
    /// Multi-progress container for all progress bars
    multi: MultiProgress,
    /// Spinners of running tasks indexed by task label
    bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
    /// Main progress bar showing overall progress
    main_bar: ProgressBar,
}

impl BuildProgress {
    /// Create a progress manager drawing into the given container
    pub fn new_with_multi_progress(total: usize, multi: MultiProgress) -> Self {
        let main_bar = multi.add(ProgressBar::new(total as u64));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} builds ({eta}) {msg}")
        {
            main_bar.set_style(style.progress_chars("#>-"));
        }
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            bars: Arc::new(Mutex::new(HashMap::new())),
            main_bar,
        }
    }

    /// Create a progress manager that draws nothing (for tests and plain output)
    pub fn hidden(total: usize) -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        Self::new_with_multi_progress(total, multi)
    }

    /// Start building a task
    pub fn start_task(&self, label: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.yellow} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(label.to_string(), bar);
        }
    }

    /// Show the latest output line of a task
    pub fn update_task_log(&self, label: &str, line: &str) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(label) {
                bar.set_message(format!("{}: {}", label, line));
            }
        }
    }

    /// Mark a task as completed successfully
    pub fn finish_task(&self, label: &str) {
        if let Some(bar) = self.take_bar(label) {
            bar.finish_and_clear();
        }
        self.main_bar.inc(1);
    }

    /// Mark a task as failed
    pub fn fail_task(&self, label: &str, error: &str) {
        if let Some(bar) = self.take_bar(label) {
            bar.abandon_with_message(format!("{}: FAILED - {}", label, error));
        }
        self.main_bar.inc(1);
    }

    /// Number of tasks finished so far
    pub fn completed(&self) -> u64 {
        self.main_bar.position()
    }

    /// Finish all progress bars
    pub fn finish(&self, failed: usize) {
        let total = self.main_bar.length().unwrap_or_default();
        self.main_bar.finish_with_message(format!(
            "Built {}/{} configurations ({} failed)",
            self.completed().saturating_sub(failed as u64),
            total,
            failed
        ));
    }

    fn take_bar(&self, label: &str) -> Option<ProgressBar> {
        self.bars.lock().ok().and_then(|mut bars| bars.remove(label))
    }
}
