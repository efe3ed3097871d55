//! Environment and argument computation for pipeline steps
//!
//! Fills the placeholders of a [`StepSpec`] with the paths of one task.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;

use super::profile::{ConfigureArg, EnvValue, PathRef, StepSpec};

/// Task-scoped values placeholders resolve against
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub install_root: &'a Utf8Path,
    pub cc: &'a Utf8Path,
    pub cxx: &'a Utf8Path,
}

impl StepContext<'_> {
    /// Every component of a task installs into the same root, so a
    /// dependency's install location is the task's install root
    pub fn resolve_path(&self, path: PathRef) -> Utf8PathBuf {
        match path {
            PathRef::InstallRoot | PathRef::InstallOf(_) => self.install_root.to_path_buf(),
            PathRef::ToolOf(_, tool) => self.install_root.join("bin").join(tool),
        }
    }

    fn resolve_value(&self, value: EnvValue) -> String {
        match value {
            EnvValue::Cc => self.cc.to_string(),
            EnvValue::Cxx => self.cxx.to_string(),
            EnvValue::Path(path) => self.resolve_path(path).to_string(),
        }
    }
}

/// Configure arguments of a profile followed by the user's extra flags
pub fn compute_configure_args(spec: &StepSpec, ctx: &StepContext<'_>, extra: &[String]) -> Vec<String> {
    spec.configure_args
        .iter()
        .map(|arg| match arg {
            ConfigureArg::Flag(flag) => flag.to_string(),
            ConfigureArg::Path(prefix, path) => format!("{}{}", prefix, ctx.resolve_path(*path)),
        })
        .chain(extra.iter().cloned())
        .collect()
}

/// Overrides for the configure stage
pub fn compute_configure_environment(spec: &StepSpec, ctx: &StepContext<'_>) -> BTreeMap<String, String> {
    resolve_entries(spec.env, ctx)
}

/// Overrides for the make stages; make-specific entries win
pub fn compute_make_environment(spec: &StepSpec, ctx: &StepContext<'_>) -> BTreeMap<String, String> {
    let mut env = resolve_entries(spec.env, ctx);
    env.extend(resolve_entries(spec.make_env, ctx));
    env
}

fn resolve_entries(entries: &[(&'static str, EnvValue)], ctx: &StepContext<'_>) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), ctx.resolve_value(*value)))
        .collect()
}
