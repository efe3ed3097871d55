//! Build report
//!
//! Every task yields a [`TaskReport`]; the supervisor collects them into a
//! [`BuildReport`] written as JSON next to the build trees.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::{Component, Flavor};
use crate::matrix::BuildTask;
use crate::{Error, Result};

/// File name of the report under the build root
pub const REPORT_FILE: &str = "llvmbuild-report.json";

/// Pipeline stage of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Configure,
    Build,
    Install,
    Check,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::Build => "build",
            Stage::Install => "install",
            Stage::Check => "check",
        };
        f.write_str(name)
    }
}

/// What happened to one component of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComponentOutcome {
    /// All stages passed; `configured` is false when configure was skipped
    Succeeded { configured: bool },
    /// A stage exited unsuccessfully; later stages did not run
    Failed {
        stage: Stage,
        exit_code: Option<i32>,
        output_tail: Vec<String>,
    },
    /// Not attempted because a component it depends on did not succeed
    Blocked { by: Component },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub component: Component,
    pub build_dir: Utf8PathBuf,
    #[serde(flatten)]
    pub outcome: ComponentOutcome,
}

impl ComponentReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ComponentOutcome::Succeeded { .. })
    }
}

/// Result of one (source, branch, flavor) task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub label: String,
    pub source: Utf8PathBuf,
    pub branch: Option<String>,
    pub flavor: Flavor,
    pub install_dir: Option<Utf8PathBuf>,
    pub components: Vec<ComponentReport>,
    /// Cause when the task was abandoned before finishing its components
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TaskReport {
    /// Report for a task abandoned with `cause`
    pub fn aborted(task: &BuildTask, label: impl Into<String>, cause: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            label: label.into(),
            source: task.source.clone(),
            branch: task.branch.clone(),
            flavor: task.flavor,
            install_dir: None,
            components: Vec::new(),
            error: Some(cause.into()),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.components.iter().all(ComponentReport::succeeded)
    }

    /// One-line description of why the task failed
    pub fn failure_summary(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        self.components.iter().find_map(|report| match &report.outcome {
            ComponentOutcome::Failed { stage, exit_code, .. } => Some(match exit_code {
                Some(code) => format!("{} {} exited with status {}", report.component, stage, code),
                None => format!("{} {} was terminated by a signal", report.component, stage),
            }),
            ComponentOutcome::Blocked { by } => Some(format!("{} blocked by {}", report.component, by)),
            ComponentOutcome::Succeeded { .. } => None,
        })
    }
}

/// Aggregate of all task reports of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks: Vec<TaskReport>,
}

impl BuildReport {
    pub fn new(started_at: DateTime<Utc>, mut tasks: Vec<TaskReport>) -> Self {
        // Workers finish in any order
        tasks.sort_by(|a, b| a.label.cmp(&b.label));
        Self {
            started_at,
            finished_at: Utc::now(),
            tasks,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| !t.succeeded())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Write the report as pretty JSON
    pub fn write(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            Error::report(
                format!("Failed to serialize build report: {}", e),
                "This is likely a bug in llvmbuild",
            )
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Read a previously written report
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::report(
                format!("Failed to parse build report {}: {}", path, e),
                "The report may be corrupted or from another version. Try deleting it.",
            )
        })
    }

    /// Log one line per task
    pub fn log_summary(&self) {
        for task in &self.tasks {
            match task.failure_summary() {
                None => tracing::info!("[{}] succeeded", task.label),
                Some(cause) => tracing::error!("[{}] FAILED: {}", task.label, cause),
            }
        }
        tracing::info!(
            "{} of {} configurations succeeded",
            self.tasks.len() - self.failed_count(),
            self.tasks.len()
        );
    }
}
