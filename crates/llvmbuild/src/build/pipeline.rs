//! Per-task build pipeline
//!
//! A task runs every enabled component, in dependency order, through
//! configure, build, install and check. All directories of a task derive
//! from its source abbreviation, branch and flavor, so concurrent tasks
//! never share a build or install tree.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::process::Command;

use crate::component::Component;
use crate::configuration::{Configuration, find_executable, is_executable};
use crate::matrix::{Abbreviations, BuildTask};
use crate::{Error, Result};

use super::command_logger::{CommandOutcome, LogCallback, run_command_with_logging};
use super::environment::{
    StepContext, compute_configure_args, compute_configure_environment, compute_make_environment,
};
use super::profile::step_spec;
use super::report::{ComponentOutcome, ComponentReport, Stage, TaskReport};

/// File configure generates in the build directory
const GENERATED_MAKEFILE: &str = "Makefile";

/// Everything needed to run one component, resolved ahead of time
#[derive(Debug, Clone)]
pub struct ComponentPlan {
    pub component: Component,
    /// Log prefix, `<component>/<task label>`
    pub prefix: String,
    pub source_dir: Utf8PathBuf,
    pub build_dir: Utf8PathBuf,
    pub configure_script: Utf8PathBuf,
    pub configure_args: Vec<String>,
    pub configure_env: BTreeMap<String, String>,
    pub make_env: BTreeMap<String, String>,
    /// Make arguments per stage, in execution order
    pub make_stages: Vec<(Stage, Vec<String>)>,
}

/// Layout and component plans of one task
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub task: BuildTask,
    pub label: String,
    pub install_root: Utf8PathBuf,
    pub components: Vec<ComponentPlan>,
}

/// Runs the component pipeline of build tasks
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    config: Arc<Configuration>,
    abbrevs: Arc<Abbreviations>,
}

impl BuildPipeline {
    pub fn new(config: Arc<Configuration>, abbrevs: Arc<Abbreviations>) -> Self {
        Self { config, abbrevs }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Resolve directories, arguments and environments of a task.
    ///
    /// `jobs` is the make parallelism granted to the worker running it.
    pub fn plan(&self, task: &BuildTask, jobs: usize) -> Result<TaskPlan> {
        let config = &self.config;
        let label = self.abbrevs.task_label(task)?;
        let source_abbrev = self.abbrevs.source(&task.source)?;

        let mut install_root = config.install_prefix.join(source_abbrev);
        if let Some(branch) = &task.branch {
            install_root.push(branch);
        }
        install_root.push(task.flavor.abbrev());

        let ctx = StepContext {
            install_root: &install_root,
            cc: &config.cc,
            cxx: &config.cxx,
        };

        let components = config
            .components
            .iter()
            .map(|&component| {
                let spec = step_spec(component, task.flavor);

                let mut source_dir = task.source.join(component.base_name());
                let mut build_dir = config.build_root.join(component.name()).join(source_abbrev);
                if let Some(branch) = &task.branch {
                    source_dir.push(branch);
                    build_dir.push(branch);
                }
                build_dir.push(task.flavor.name());

                let mut make_args = Vec::new();
                if spec.makefile_in_source {
                    make_args.push("-f".to_string());
                    make_args.push(source_dir.join("Makefile").to_string());
                }
                let parallel = format!("-j{}", jobs);

                let mut build_args = make_args.clone();
                build_args.push(parallel.clone());
                build_args.extend(spec.build_targets.iter().map(|t| t.to_string()));

                let mut install_args = make_args.clone();
                install_args.push("install".to_string());

                let mut make_stages = vec![(Stage::Build, build_args), (Stage::Install, install_args)];
                if config.check {
                    let mut check_args = make_args;
                    check_args.push(parallel);
                    check_args.push("check".to_string());
                    make_stages.push((Stage::Check, check_args));
                }

                ComponentPlan {
                    component,
                    prefix: format!("{}/{}", component, label),
                    configure_script: source_dir.join("configure"),
                    configure_args: compute_configure_args(spec, &ctx, config.extra_flags(component)),
                    configure_env: compute_configure_environment(spec, &ctx),
                    make_env: compute_make_environment(spec, &ctx),
                    make_stages,
                    source_dir,
                    build_dir,
                }
            })
            .collect();

        Ok(TaskPlan {
            task: task.clone(),
            label,
            install_root,
            components,
        })
    }

    /// Run every component of a task.
    ///
    /// A component whose stage fails is reported as failed; components that
    /// depend on it are reported as blocked and not run. Errors returned here
    /// abandon the whole task (for example a missing make program).
    pub async fn run(&self, task: &BuildTask, jobs: usize, log_callback: Option<LogCallback>) -> Result<TaskReport> {
        let started_at = Utc::now();
        let make = find_executable(&self.config.make).ok_or_else(|| {
            Error::tool_missing(
                self.config.make.clone(),
                "Install make or point --make at a working make program",
            )
        })?;

        let plan = self.plan(task, jobs)?;
        std::fs::create_dir_all(&plan.install_root)?;
        tracing::info!("[{}] Building into {}", plan.label, plan.install_root);

        let mut reports: Vec<ComponentReport> = Vec::new();
        let mut unusable: Vec<Component> = Vec::new();

        for component_plan in &plan.components {
            let component = component_plan.component;

            let blocker = component
                .dependencies()
                .iter()
                .find(|dep| unusable.contains(dep))
                .copied();

            let outcome = match blocker {
                Some(by) => {
                    tracing::warn!("[{}] Skipped: {} did not build", component_plan.prefix, by);
                    ComponentOutcome::Blocked { by }
                }
                None => self.build_component(component_plan, &make, log_callback.clone()).await?,
            };

            if !matches!(outcome, ComponentOutcome::Succeeded { .. }) {
                unusable.push(component);
            }
            reports.push(ComponentReport {
                component,
                build_dir: component_plan.build_dir.clone(),
                outcome,
            });
        }

        Ok(TaskReport {
            label: plan.label,
            source: task.source.clone(),
            branch: task.branch.clone(),
            flavor: task.flavor,
            install_dir: Some(plan.install_root),
            components: reports,
            error: None,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn build_component(
        &self,
        plan: &ComponentPlan,
        make: &Utf8Path,
        log_callback: Option<LogCallback>,
    ) -> Result<ComponentOutcome> {
        let configured = if !is_executable(&plan.configure_script) {
            tracing::debug!("[{}] No configure script, skipping configure", plan.prefix);
            false
        } else if !needs_configure(
            &plan.configure_script,
            &plan.build_dir.join(GENERATED_MAKEFILE),
            self.config.force_configure,
        ) {
            tracing::info!("[{}] Makefile is up to date, skipping configure", plan.prefix);
            false
        } else {
            tracing::info!("[{}] configure {}", plan.prefix, plan.configure_args.join(" "));
            let mut cmd = Command::new(plan.configure_script.as_str());
            cmd.args(&plan.configure_args);
            let outcome = run_command_with_logging(
                &mut cmd,
                &plan.build_dir,
                &plan.configure_env,
                &plan.prefix,
                log_callback.clone(),
            )
            .await?;
            if !outcome.success() {
                return Ok(failed(&plan.prefix, Stage::Configure, outcome));
            }
            true
        };

        for (stage, args) in &plan.make_stages {
            tracing::info!("[{}] {} ({} {})", plan.prefix, stage, make, args.join(" "));
            let mut cmd = Command::new(make.as_str());
            cmd.args(args);
            let outcome = run_command_with_logging(
                &mut cmd,
                &plan.build_dir,
                &plan.make_env,
                &plan.prefix,
                log_callback.clone(),
            )
            .await?;
            if !outcome.success() {
                return Ok(failed(&plan.prefix, *stage, outcome));
            }
        }

        tracing::info!("[{}] Done", plan.prefix);
        Ok(ComponentOutcome::Succeeded { configured })
    }
}

fn failed(prefix: &str, stage: Stage, outcome: CommandOutcome) -> ComponentOutcome {
    tracing::error!("[{}] {} failed with {}", prefix, stage, outcome.status);
    ComponentOutcome::Failed {
        stage,
        exit_code: outcome.code(),
        output_tail: outcome.tail,
    }
}

/// Whether configure must run: forced, no generated file yet, or the
/// generated file is not newer than the script
pub fn needs_configure(script: &Utf8Path, generated: &Utf8Path, force: bool) -> bool {
    if force {
        return true;
    }

    let modified = |path: &Utf8Path| std::fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(script), modified(generated)) {
        (Some(script_time), Some(generated_time)) => generated_time <= script_time,
        _ => true,
    }
}
