//! Validated build configuration
//!
//! [`Configuration`] is produced once from the merged [`Config`] and the
//! command line, and is read-only for the rest of the run. Everything that
//! can be checked before a single task is enqueued is checked here.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;

use crate::component::{self, Component, Flavor};
use crate::config::Config;
use crate::{Error, Result};

/// Immutable, validated input of the build matrix
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Canonicalized source trees
    pub sources: Vec<Utf8PathBuf>,
    /// Branch subdirectories; empty means unbranched checkouts
    pub branches: Vec<String>,
    pub flavors: Vec<Flavor>,
    /// Enabled components in dependency order
    pub components: Vec<Component>,
    pub cc: Utf8PathBuf,
    pub cxx: Utf8PathBuf,
    /// Make program, resolved by each worker when it starts a task
    pub make: String,
    pub threads: usize,
    pub jobs: usize,
    pub install_prefix: Utf8PathBuf,
    pub build_root: Utf8PathBuf,
    pub extra_config_flags: BTreeMap<Component, Vec<String>>,
    pub force_configure: bool,
    pub check: bool,
}

impl Configuration {
    /// Validate a merged configuration.
    ///
    /// Relative prefixes and source paths are resolved against `workdir`.
    pub fn validate(config: &Config, workdir: &Utf8Path) -> Result<Self> {
        let build = &config.build;

        if build.sources.is_empty() {
            return Err(Error::config(
                "No source trees given",
                "Pass --src or set build.sources in llvmbuild.toml",
            ));
        }
        if build.threads == 0 || build.jobs == 0 {
            return Err(Error::config(
                "threads and jobs must both be at least 1",
                "Pass --threads and --jobs with positive values",
            ));
        }

        let mut flavors = Vec::new();
        for name in &build.flavors {
            let flavor: Flavor = name.parse()?;
            if !flavors.contains(&flavor) {
                flavors.push(flavor);
            }
        }
        if flavors.is_empty() {
            return Err(Error::config(
                "No flavors given",
                "Pass --flavor with one of: debug, release, paranoid",
            ));
        }

        let enabled: Vec<Component> = Component::ALL
            .into_iter()
            .filter(|c| config.component(*c).enabled)
            .collect();
        if enabled.is_empty() {
            return Err(Error::config(
                "All components are disabled",
                "Enable at least one of: llvm, llvm-gcc, llvm2, gcc, dragonegg",
            ));
        }
        let components = component::build_order(&enabled)?;
        warn_about_missing_dependencies(&components);

        for branch in &build.branches {
            if Utf8Path::new(branch).is_absolute() {
                return Err(Error::config(
                    format!("Branch '{}' must be a relative path", branch),
                    "Branches name a subdirectory under each component's sources",
                ));
            }
        }

        let mut sources = Vec::new();
        for source in &build.sources {
            let source = canonicalize_source(&workdir.join(source))?;
            check_source_layout(&source, &components, &build.branches)?;
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        let cc = find_executable(&build.cc).ok_or_else(|| {
            Error::config(
                format!("C compiler '{}' not found", build.cc),
                "Pass --cc with an absolute path or a program on PATH",
            )
        })?;
        let cxx = find_executable(&build.cxx).ok_or_else(|| {
            Error::config(
                format!("C++ compiler '{}' not found", build.cxx),
                "Pass --cxx with an absolute path or a program on PATH",
            )
        })?;

        let extra_config_flags = components
            .iter()
            .map(|c| (*c, config.component(*c).extra_config_flags))
            .filter(|(_, flags)| !flags.is_empty())
            .collect();

        Ok(Self {
            sources,
            branches: build.branches.clone(),
            flavors,
            components,
            cc,
            cxx,
            make: build.make.clone(),
            threads: build.threads,
            jobs: build.jobs,
            install_prefix: workdir.join(&build.install_prefix),
            build_root: workdir.join(&build.build_dir),
            extra_config_flags,
            force_configure: build.force_configure,
            check: build.check,
        })
    }

    /// Extra configure flags for a component
    pub fn extra_flags(&self, component: Component) -> &[String] {
        self.extra_config_flags
            .get(&component)
            .map(|flags| flags.as_slice())
            .unwrap_or_default()
    }
}

fn warn_about_missing_dependencies(components: &[Component]) {
    for component in components {
        for dep in component.dependencies() {
            if !components.contains(dep) {
                tracing::warn!(
                    "{} depends on {}, which is disabled; using a previously installed {}",
                    component,
                    dep,
                    dep
                );
            }
        }
    }
}

fn canonicalize_source(path: &Utf8Path) -> Result<Utf8PathBuf> {
    path.canonicalize_utf8().map_err(|e| {
        Error::config(
            format!("Source tree {} is not accessible: {}", path, e),
            "Ensure the path exists and is a directory",
        )
    })
}

/// Every enabled component needs its source subdirectory, and each
/// configured branch beneath it
fn check_source_layout(source: &Utf8Path, components: &[Component], branches: &[String]) -> Result<()> {
    if !source.is_dir() {
        return Err(Error::config(
            format!("Source tree {} is not a directory", source),
            "Each --src must point at a directory holding the component checkouts",
        ));
    }

    for component in components {
        let component_dir = source.join(component.base_name());
        if !component_dir.is_dir() {
            return Err(Error::config(
                format!("{} has no {} directory", source, component.base_name()),
                format!(
                    "Check out {} under {}, or disable it with --no-{}",
                    component.base_name(),
                    source,
                    component
                ),
            ));
        }

        for branch in branches {
            let branch_dir = component_dir.join(branch);
            if !branch_dir.is_dir() {
                return Err(Error::config(
                    format!("{} has no branch {}", component_dir, branch),
                    "Every configured branch must exist under every component",
                ));
            }
        }
    }

    Ok(())
}

/// Resolve a program name against PATH; paths with a directory part are
/// only checked for executability
pub fn find_executable(program: &str) -> Option<Utf8PathBuf> {
    let candidate = Utf8Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .map(|dir| dir.join(program))
        .find(|p| is_executable(p))
}

/// Whether a path is a regular file with any execute bit set
#[cfg(unix)]
pub fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Utf8Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_tree(root: &Utf8Path, name: &str, dirs: &[&str]) -> Utf8PathBuf {
        let source = root.join(name);
        for dir in dirs {
            std::fs::create_dir_all(source.join(dir)).unwrap();
        }
        source
    }

    fn config_for(sources: Vec<Utf8PathBuf>) -> Config {
        let mut config = Config::default();
        config.build.sources = sources;
        config.build.cc = "sh".to_string();
        config.build.cxx = "sh".to_string();
        config
    }

    const ALL_DIRS: &[&str] = &["llvm", "llvm-gcc", "gcc", "dragonegg"];

    #[test]
    fn test_validate_resolves_sources_and_prefixes() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        source_tree(root, "a", ALL_DIRS);

        let config = config_for(vec![Utf8PathBuf::from("a")]);
        let validated = Configuration::validate(&config, root).unwrap();

        assert_eq!(validated.sources.len(), 1);
        assert!(validated.sources[0].is_absolute());
        assert_eq!(validated.install_prefix, root.join("install"));
        assert_eq!(validated.build_root, root.join("build"));
        assert_eq!(validated.flavors, vec![Flavor::Debug]);
        assert_eq!(validated.components.len(), 5);
        assert!(validated.cc.is_absolute());
    }

    #[test]
    fn test_missing_frontend_directory_fails() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let source = source_tree(root, "a", &["llvm", "gcc", "dragonegg"]);

        let err = Configuration::validate(&config_for(vec![source]), root).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("llvm-gcc"));
    }

    #[test]
    fn test_disabled_component_needs_no_directory() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let source = source_tree(root, "a", &["llvm", "gcc", "dragonegg"]);

        let mut config = config_for(vec![source]);
        config.component_mut(Component::LlvmGcc).enabled = false;
        config.component_mut(Component::Llvm2).enabled = false;

        let validated = Configuration::validate(&config, root).unwrap();
        assert!(!validated.components.contains(&Component::LlvmGcc));
    }

    #[test]
    fn test_missing_branch_fails() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let source = source_tree(root, "a", &["llvm/trunk", "llvm-gcc/trunk", "gcc", "dragonegg/trunk"]);

        let mut config = config_for(vec![source]);
        config.build.branches = vec!["trunk".to_string()];

        let err = Configuration::validate(&config, root).unwrap_err();
        assert!(err.to_string().contains("trunk"));
    }

    #[test]
    fn test_invalid_flavor_fails() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let source = source_tree(root, "a", ALL_DIRS);

        let mut config = config_for(vec![source]);
        config.build.flavors = vec!["debug".to_string(), "turbo".to_string()];

        let err = Configuration::validate(&config, root).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_missing_compiler_fails() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let source = source_tree(root, "a", ALL_DIRS);

        let mut config = config_for(vec![source]);
        config.build.cc = "definitely-not-a-compiler-xyz".to_string();

        assert!(Configuration::validate(&config, root).is_err());
    }

    #[test]
    fn test_no_sources_fails() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        assert!(Configuration::validate(&config_for(Vec::new()), root).is_err());
    }

    #[test]
    fn test_extra_flags_lookup() {
        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let source = source_tree(root, "a", ALL_DIRS);

        let mut config = config_for(vec![source]);
        config.component_mut(Component::Gcc).extra_config_flags = vec!["--with-gmp=/opt".to_string()];

        let validated = Configuration::validate(&config, root).unwrap();
        assert_eq!(validated.extra_flags(Component::Gcc), ["--with-gmp=/opt"]);
        assert!(validated.extra_flags(Component::Llvm).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable() {
        assert!(find_executable("sh").is_some());
        assert!(find_executable("/bin/sh").is_some());
        assert!(find_executable("/nonexistent/sh").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_any_execute_bit_counts() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let tool = root.join("tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!is_executable(&tool));

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o610)).unwrap();
        assert!(is_executable(&tool));
        assert!(!is_executable(root), "directories are not programs");
    }
}
