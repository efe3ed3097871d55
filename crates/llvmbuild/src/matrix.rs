//! Build matrix enumeration
//!
//! The matrix is the cross product of flavors, source trees and branches.
//! Abbreviations for source trees and branches are resolved once here and
//! shared read-only by every task.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::{Error, Result};
use crate::abbrev::AbbreviationMap;
use crate::component::Flavor;
use crate::configuration::Configuration;

/// One independent (source, branch, flavor) build
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildTask {
    pub source: Utf8PathBuf,
    pub branch: Option<String>,
    pub flavor: Flavor,
}

/// Abbreviations shared by all tasks of a run
#[derive(Debug, Clone)]
pub struct Abbreviations {
    pub sources: AbbreviationMap,
    pub branches: AbbreviationMap,
}

impl Abbreviations {
    pub fn resolve(config: &Configuration) -> Result<Self> {
        let sources = AbbreviationMap::resolve(&config.sources)?;
        let branches = if config.branches.is_empty() {
            AbbreviationMap::default()
        } else {
            let paths: Vec<Utf8PathBuf> = config.branches.iter().map(Utf8PathBuf::from).collect();
            AbbreviationMap::resolve(&paths)?
        };

        for (path, label) in sources.iter() {
            tracing::debug!("Source {} is labelled '{}'", path, label);
        }

        Ok(Self { sources, branches })
    }

    /// Label of a source tree; only trees of the resolved set have one
    pub fn source(&self, source: &Utf8Path) -> Result<&str> {
        self.sources.get(source).ok_or_else(|| {
            Error::abbreviation(
                format!("Source tree {} has no label", source),
                "Tasks must come from the configuration the labels were resolved for",
            )
        })
    }

    /// Label of a branch; branches outside the resolved set keep their name
    pub fn branch<'a>(&'a self, branch: &'a str) -> &'a str {
        self.branches.get(Utf8Path::new(branch)).unwrap_or(branch)
    }

    /// Task label: `source/branch/flavor` abbreviations
    pub fn task_label(&self, task: &BuildTask) -> Result<String> {
        let mut parts = vec![self.source(&task.source)?];
        if let Some(branch) = &task.branch {
            parts.push(self.branch(branch));
        }
        parts.push(task.flavor.abbrev());
        Ok(parts.join("/"))
    }
}

/// Validated configuration, its abbreviations, and the enumerated tasks
#[derive(Debug, Clone)]
pub struct BuildMatrix {
    pub config: Configuration,
    pub abbrevs: Abbreviations,
    pub tasks: Vec<BuildTask>,
}

impl BuildMatrix {
    pub fn new(config: Configuration) -> Result<Self> {
        let abbrevs = Abbreviations::resolve(&config)?;
        let tasks = enumerate_tasks(&config);
        Ok(Self {
            config,
            abbrevs,
            tasks,
        })
    }
}

/// Cross product flavors × sources × branches; the branch dimension is
/// dropped when no branches are configured
pub fn enumerate_tasks(config: &Configuration) -> Vec<BuildTask> {
    let branches: Vec<Option<String>> = if config.branches.is_empty() {
        vec![None]
    } else {
        config.branches.iter().cloned().map(Some).collect()
    };

    let mut tasks = Vec::new();
    for flavor in &config.flavors {
        for source in &config.sources {
            for branch in &branches {
                tasks.push(BuildTask {
                    source: source.clone(),
                    branch: branch.clone(),
                    flavor: *flavor,
                });
            }
        }
    }
    tasks
}
