//! Plan command implementation
//!
//! Prints what `build` would run for every configuration without running it.

use camino::Utf8Path;
use clap::Args;
use miette::Result;
use std::fmt::Write;
use std::sync::Arc;

use crate::build::{BuildPipeline, TaskPlan, partition_jobs};

use super::MatrixArgs;

/// Arguments for the plan command
#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub matrix: MatrixArgs,
}

/// Run the plan command
pub fn run(workdir: &Utf8Path, args: PlanArgs) -> Result<()> {
    let matrix = super::load_matrix(workdir, args.matrix)?;
    let partition = partition_jobs(matrix.config.jobs, matrix.config.threads);

    println!(
        "{} configurations, {} at a time with make -j{}",
        matrix.tasks.len(),
        partition.workers,
        partition.jobs_per_worker
    );

    let pipeline = BuildPipeline::new(Arc::new(matrix.config.clone()), Arc::new(matrix.abbrevs.clone()));
    for task in &matrix.tasks {
        let plan = pipeline.plan(task, partition.jobs_per_worker)?;
        print!("{}", render_plan(&plan, &matrix.config.make));
    }

    Ok(())
}

/// Human readable listing of one task's directories, commands and environment
pub fn render_plan(plan: &TaskPlan, make: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_plan(&mut out, plan, make);
    out
}

fn write_plan(out: &mut String, plan: &TaskPlan, make: &str) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{} ({})", plan.label, plan.task.flavor)?;
    writeln!(out, "  install: {}", plan.install_root)?;
    for component in &plan.components {
        writeln!(out, "  {}", component.component)?;
        writeln!(out, "    source: {}", component.source_dir)?;
        writeln!(out, "    build:  {}", component.build_dir)?;
        if !component.configure_args.is_empty() {
            writeln!(
                out,
                "    {} {}",
                component.configure_script,
                component.configure_args.join(" ")
            )?;
            for (name, value) in &component.configure_env {
                writeln!(out, "      {}={}", name, value)?;
            }
        }
        for (stage, args) in &component.make_stages {
            writeln!(out, "    [{}] {} {}", stage, make, args.join(" "))?;
        }
        for (name, value) in &component.make_env {
            writeln!(out, "      {}={}", name, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Flavor;
    use crate::matrix::tests::configuration;
    use crate::matrix::{Abbreviations, BuildTask};
    use camino::Utf8PathBuf;

    #[test]
    fn test_plan_lists_make_environment() {
        let config = configuration(&["/s/alpha"], &[], &[Flavor::Debug]);
        let abbrevs = Abbreviations::resolve(&config).unwrap();
        let pipeline = BuildPipeline::new(Arc::new(config), Arc::new(abbrevs));
        let task = BuildTask {
            source: Utf8PathBuf::from("/s/alpha"),
            branch: None,
            flavor: Flavor::Debug,
        };

        let rendered = render_plan(&pipeline.plan(&task, 2).unwrap(), "make");

        assert!(rendered.contains("alpha/dbg (debug)"));
        assert!(rendered.contains("/s/alpha/llvm/configure --prefix=/inst/alpha/dbg"));
        assert!(rendered.contains("GCC=/inst/alpha/dbg/bin/gcc"));
        assert!(rendered.contains("LLVM_CONFIG=/inst/alpha/dbg/bin/llvm-config"));
        assert!(rendered.contains("[install] make -f /s/alpha/dragonegg/Makefile install"));
    }
}
