//! Toolchain components and build flavors
//!
//! This module defines the fixed set of toolchain components, the build
//! flavors each of them can be configured with, and the dependency graph
//! that decides the order components are processed in.

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// One buildable unit of the toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    /// The primary compiler (LLVM itself)
    Llvm,
    /// GCC-based frontend emitting LLVM IR
    LlvmGcc,
    /// Second build of the LLVM sources, compiled by llvm-gcc
    Llvm2,
    /// Host compiler
    Gcc,
    /// GCC plugin driving LLVM
    Dragonegg,
}

impl Component {
    /// All components in their canonical order
    pub const ALL: [Component; 5] = [
        Component::Llvm,
        Component::LlvmGcc,
        Component::Llvm2,
        Component::Gcc,
        Component::Dragonegg,
    ];

    /// Component name, used for build directories and log prefixes
    pub fn name(self) -> &'static str {
        match self {
            Component::Llvm => "llvm",
            Component::LlvmGcc => "llvm-gcc",
            Component::Llvm2 => "llvm2",
            Component::Gcc => "gcc",
            Component::Dragonegg => "dragonegg",
        }
    }

    /// Name of the source subdirectory holding this component.
    ///
    /// llvm2 is a second build of the llvm sources.
    pub fn base_name(self) -> &'static str {
        match self {
            Component::Llvm | Component::Llvm2 => "llvm",
            other => other.name(),
        }
    }

    /// Components whose installed artifacts this component consumes
    pub fn dependencies(self) -> &'static [Component] {
        match self {
            Component::Llvm | Component::Gcc => &[],
            Component::LlvmGcc => &[Component::Llvm],
            Component::Llvm2 => &[Component::Llvm, Component::LlvmGcc],
            Component::Dragonegg => &[Component::Llvm, Component::Gcc],
        }
    }

    /// Whether this component builds itself with its own freshly built compiler
    pub fn is_self_hosting(self) -> bool {
        matches!(self, Component::LlvmGcc | Component::Gcc)
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Component {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Component::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| {
                Error::config(
                    format!("Unknown component '{}'", s),
                    "Valid components are: llvm, llvm-gcc, llvm2, gcc, dragonegg",
                )
            })
    }
}

/// Named build configuration profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Debug,
    Release,
    Paranoid,
}

impl Flavor {
    pub const ALL: [Flavor; 3] = [Flavor::Debug, Flavor::Release, Flavor::Paranoid];

    pub fn name(self) -> &'static str {
        match self {
            Flavor::Debug => "debug",
            Flavor::Release => "release",
            Flavor::Paranoid => "paranoid",
        }
    }

    /// Three character abbreviation used in install paths and log prefixes
    pub fn abbrev(self) -> &'static str {
        match self {
            Flavor::Debug => "dbg",
            Flavor::Release => "opt",
            Flavor::Paranoid => "par",
        }
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Flavor::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| {
                Error::config(
                    format!("Invalid flavor '{}'", s),
                    "Valid flavors are: debug, release, paranoid",
                )
            })
    }
}

/// Compute the processing order of the given components.
///
/// Only dependencies between the given components are considered; a
/// component whose dependency is not selected builds against whatever a
/// previous run installed.
pub fn build_order(components: &[Component]) -> Result<Vec<Component>> {
    // Edge from A to B means B consumes A's install (A must be built first)
    let mut graph = DiGraph::<Component, ()>::new();
    let mut node_indices = HashMap::new();

    // Canonical order keeps the sort deterministic
    let mut selected: Vec<Component> = components.to_vec();
    selected.sort();
    selected.dedup();

    for component in &selected {
        node_indices.insert(*component, graph.add_node(*component));
    }

    for component in &selected {
        let dependent_idx = node_indices[component];
        for dep in component.dependencies() {
            if let Some(&dependency_idx) = node_indices.get(dep) {
                graph.add_edge(dependency_idx, dependent_idx, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(sorted) => Ok(sorted.into_iter().map(|idx| graph[idx]).collect()),
        Err(cycle) => Err(Error::circular_dependency(vec![
            graph[cycle.node_id()].to_string(),
        ])),
    }
}
