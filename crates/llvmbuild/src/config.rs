//! Configuration file parsing and merging
//!
//! This module handles parsing of `llvmbuild.toml` and `llvmbuild.local.toml`.
//! The local file overrides the shared one: tables are merged recursively,
//! arrays and scalars are replaced.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Result;
use crate::component::Component;

/// Shared configuration file name
pub const CONFIG_FILE: &str = "llvmbuild.toml";

/// Local, uncommitted override file name
pub const LOCAL_CONFIG_FILE: &str = "llvmbuild.local.toml";

/// Main configuration structure for llvmbuild
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build matrix settings
    pub build: BuildConfig,

    /// Per component settings
    pub components: BTreeMap<Component, ComponentConfig>,
}

/// Build matrix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Top-level source trees
    pub sources: Vec<Utf8PathBuf>,

    /// Branch subdirectories to build under each component
    pub branches: Vec<String>,

    /// Flavors to build (debug, release, paranoid)
    pub flavors: Vec<String>,

    /// C compiler used to build the toolchain
    pub cc: String,

    /// C++ compiler used to build the toolchain
    pub cxx: String,

    /// Make program
    pub make: String,

    /// Number of builds to run at once
    pub threads: usize,

    /// Total number of compiler jobs shared by all builds
    pub jobs: usize,

    /// Root of all install trees (default: "install")
    pub install_prefix: Utf8PathBuf,

    /// Root of all build trees (default: "build")
    pub build_dir: Utf8PathBuf,

    /// Re-run configure even when the generated Makefile is up to date
    pub force_configure: bool,

    /// Run the test stage (`make check`)
    pub check: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            branches: Vec::new(),
            flavors: vec!["debug".to_string()],
            cc: "gcc".to_string(),
            cxx: "g++".to_string(),
            make: "make".to_string(),
            threads: 4,
            jobs: 8,
            install_prefix: Utf8PathBuf::from("install"),
            build_dir: Utf8PathBuf::from("build"),
            force_configure: false,
            check: true,
        }
    }
}

/// Component specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Build this component (default: true)
    pub enabled: bool,

    /// Additional configure flags, appended verbatim
    pub extra_config_flags: Vec<String>,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_config_flags: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a directory.
    ///
    /// This loads `llvmbuild.toml` and optionally merges `llvmbuild.local.toml`
    /// if it exists. Missing files yield the defaults.
    pub fn load(dir: &Utf8Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        let local_config_path = dir.join(LOCAL_CONFIG_FILE);

        let base_config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<toml::Value>(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let local_config = if local_config_path.exists() {
            tracing::debug!("Merging {}", local_config_path);
            let content = std::fs::read_to_string(&local_config_path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        } else {
            None
        };

        let merged = if let Some(local) = local_config {
            merge_toml_values(base_config, local)
        } else {
            base_config
        };

        let config: Config = merged.try_into()?;
        Ok(config)
    }

    /// Load configuration from a string (for testing)
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Settings for a component, falling back to the defaults
    pub fn component(&self, component: Component) -> ComponentConfig {
        self.components.get(&component).cloned().unwrap_or_default()
    }

    /// Mutable settings for a component, inserting the defaults if absent
    pub fn component_mut(&mut self, component: Component) -> &mut ComponentConfig {
        self.components.entry(component).or_default()
    }
}

/// Merge two TOML values:
/// - Tables: recursively merged
/// - Arrays: local replaces base (not merged)
/// - Primitives: local overrides base
fn merge_toml_values(base: toml::Value, local: toml::Value) -> toml::Value {
    match (base, local) {
        (toml::Value::Table(mut base_table), toml::Value::Table(local_table)) => {
            for (key, local_value) in local_table {
                if let Some(base_value) = base_table.remove(&key) {
                    base_table.insert(key, merge_toml_values(base_value, local_value));
                } else {
                    base_table.insert(key, local_value);
                }
            }
            toml::Value::Table(base_table)
        }
        (_, local) => local,
    }
}
