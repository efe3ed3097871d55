//! Static configure and make profiles per component and flavor
//!
//! Paths that are only known once a task is laid out (its install root,
//! tools installed by earlier components) appear as [`PathRef`] placeholders
//! and are filled in by [`super::environment`].

use crate::component::{Component, Flavor};

/// A path known only per task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRef {
    /// The task's install root
    InstallRoot,
    /// Where a dependency was installed
    InstallOf(Component),
    /// A program a dependency installed under `bin/`
    ToolOf(Component, &'static str),
}

impl PathRef {
    /// The component whose install this path points into
    pub fn component(self) -> Option<Component> {
        match self {
            PathRef::InstallRoot => None,
            PathRef::InstallOf(c) | PathRef::ToolOf(c, _) => Some(c),
        }
    }
}

/// One configure argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureArg {
    Flag(&'static str),
    /// Flag prefix followed by a resolved path, e.g. `--prefix=<root>`
    Path(&'static str, PathRef),
}

/// Value of an environment override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvValue {
    /// The configured C compiler
    Cc,
    /// The configured C++ compiler
    Cxx,
    Path(PathRef),
}

/// Declarative description of how one component is built in one flavor
#[derive(Debug)]
pub struct StepSpec {
    pub configure_args: &'static [ConfigureArg],
    /// Overrides for every stage
    pub env: &'static [(&'static str, EnvValue)],
    /// Additional overrides for the make stages
    pub make_env: &'static [(&'static str, EnvValue)],
    /// Targets of the build stage; empty means the default target
    pub build_targets: &'static [&'static str],
    /// Run make against the Makefile in the source directory
    pub makefile_in_source: bool,
}

impl StepSpec {
    /// All path placeholders this profile refers to
    pub fn path_refs(&self) -> impl Iterator<Item = PathRef> + '_ {
        let args = self.configure_args.iter().filter_map(|arg| match arg {
            ConfigureArg::Path(_, path) => Some(*path),
            ConfigureArg::Flag(_) => None,
        });
        let env = self
            .env
            .iter()
            .chain(self.make_env)
            .filter_map(|(_, value)| match value {
                EnvValue::Path(path) => Some(*path),
                _ => None,
            });
        args.chain(env)
    }
}

use ConfigureArg::{Flag, Path};
use PathRef::{InstallOf, InstallRoot, ToolOf};

const HOST_COMPILERS: &[(&str, EnvValue)] = &[("CC", EnvValue::Cc), ("CXX", EnvValue::Cxx)];

static LLVM_DEBUG: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Flag("--disable-optimized"),
        Flag("--enable-assertions"),
        Flag("--enable-debug-symbols"),
        Flag("--enable-jit"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

static LLVM_RELEASE: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Flag("--enable-optimized"),
        Flag("--disable-assertions"),
        Flag("--enable-jit"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

static LLVM_PARANOID: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Flag("--disable-optimized"),
        Flag("--enable-assertions"),
        Flag("--enable-expensive-checks"),
        Flag("--enable-debug-runtime"),
        Flag("--enable-jit"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

static LLVM_GCC_DEBUG: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Path("--enable-llvm=", InstallOf(Component::Llvm)),
        Flag("--enable-languages=c,c++"),
        Flag("--disable-bootstrap"),
        Flag("--disable-multilib"),
        Flag("--enable-checking"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

static LLVM_GCC_RELEASE: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Path("--enable-llvm=", InstallOf(Component::Llvm)),
        Flag("--enable-languages=c,c++"),
        Flag("--disable-multilib"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &["bootstrap"],
    makefile_in_source: false,
};

static LLVM_GCC_PARANOID: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Path("--enable-llvm=", InstallOf(Component::Llvm)),
        Flag("--enable-languages=c,c++"),
        Flag("--disable-bootstrap"),
        Flag("--disable-multilib"),
        Flag("--enable-checking=all"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

const LLVM_GCC_COMPILERS: &[(&str, EnvValue)] = &[
    ("CC", EnvValue::Path(ToolOf(Component::LlvmGcc, "llvm-gcc"))),
    ("CXX", EnvValue::Path(ToolOf(Component::LlvmGcc, "llvm-g++"))),
];

static LLVM2_DEBUG: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Path("--with-llvmgccdir=", InstallOf(Component::LlvmGcc)),
        Flag("--disable-optimized"),
        Flag("--enable-assertions"),
        Flag("--enable-debug-symbols"),
    ],
    env: LLVM_GCC_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

static LLVM2_RELEASE: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Path("--with-llvmgccdir=", InstallOf(Component::LlvmGcc)),
        Flag("--enable-optimized"),
        Flag("--disable-assertions"),
    ],
    env: LLVM_GCC_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

static LLVM2_PARANOID: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Path("--with-llvmgccdir=", InstallOf(Component::LlvmGcc)),
        Flag("--disable-optimized"),
        Flag("--enable-assertions"),
        Flag("--enable-expensive-checks"),
    ],
    env: LLVM_GCC_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

static GCC_DEBUG: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Flag("--enable-languages=c,c++"),
        Flag("--disable-bootstrap"),
        Flag("--disable-multilib"),
        Flag("--enable-checking"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

static GCC_RELEASE: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Flag("--enable-languages=c,c++"),
        Flag("--disable-multilib"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &["bootstrap"],
    makefile_in_source: false,
};

static GCC_PARANOID: StepSpec = StepSpec {
    configure_args: &[
        Path("--prefix=", InstallRoot),
        Flag("--enable-languages=c,c++"),
        Flag("--disable-bootstrap"),
        Flag("--disable-multilib"),
        Flag("--enable-checking=all"),
    ],
    env: HOST_COMPILERS,
    make_env: &[],
    build_targets: &[],
    makefile_in_source: false,
};

// dragonegg ships no configure script; it is pointed at its peers through
// the make environment
const DRAGONEGG_PEERS: &[(&str, EnvValue)] = &[
    ("GCC", EnvValue::Path(ToolOf(Component::Gcc, "gcc"))),
    ("LLVM_CONFIG", EnvValue::Path(ToolOf(Component::Llvm, "llvm-config"))),
];

static DRAGONEGG: StepSpec = StepSpec {
    configure_args: &[],
    env: HOST_COMPILERS,
    make_env: DRAGONEGG_PEERS,
    build_targets: &[],
    makefile_in_source: true,
};

/// Look up the profile for a component in a flavor
pub fn step_spec(component: Component, flavor: Flavor) -> &'static StepSpec {
    match (component, flavor) {
        (Component::Llvm, Flavor::Debug) => &LLVM_DEBUG,
        (Component::Llvm, Flavor::Release) => &LLVM_RELEASE,
        (Component::Llvm, Flavor::Paranoid) => &LLVM_PARANOID,
        (Component::LlvmGcc, Flavor::Debug) => &LLVM_GCC_DEBUG,
        (Component::LlvmGcc, Flavor::Release) => &LLVM_GCC_RELEASE,
        (Component::LlvmGcc, Flavor::Paranoid) => &LLVM_GCC_PARANOID,
        (Component::Llvm2, Flavor::Debug) => &LLVM2_DEBUG,
        (Component::Llvm2, Flavor::Release) => &LLVM2_RELEASE,
        (Component::Llvm2, Flavor::Paranoid) => &LLVM2_PARANOID,
        (Component::Gcc, Flavor::Debug) => &GCC_DEBUG,
        (Component::Gcc, Flavor::Release) => &GCC_RELEASE,
        (Component::Gcc, Flavor::Paranoid) => &GCC_PARANOID,
        (Component::Dragonegg, _) => &DRAGONEGG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_only_reference_declared_dependencies() {
        for component in Component::ALL {
            for flavor in Flavor::ALL {
                for path in step_spec(component, flavor).path_refs() {
                    if let Some(referenced) = path.component() {
                        assert!(
                            component.dependencies().contains(&referenced),
                            "{} ({}) refers to {} without declaring it as a dependency",
                            component,
                            flavor,
                            referenced
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_configured_components_install_into_task_root() {
        for component in Component::ALL {
            for flavor in Flavor::ALL {
                let spec = step_spec(component, flavor);
                if spec.configure_args.is_empty() {
                    continue;
                }
                assert_eq!(
                    spec.configure_args[0],
                    Path("--prefix=", InstallRoot),
                    "{} ({}) must install into the task root",
                    component,
                    flavor
                );
            }
        }
    }

    #[test]
    fn test_only_self_hosting_components_bootstrap() {
        for component in Component::ALL {
            for flavor in Flavor::ALL {
                let bootstraps = step_spec(component, flavor).build_targets.contains(&"bootstrap");
                assert!(!bootstraps || component.is_self_hosting());
            }
        }
    }

    #[test]
    fn test_flavors_differ_in_flags() {
        let debug = step_spec(Component::Llvm, Flavor::Debug).configure_args;
        let release = step_spec(Component::Llvm, Flavor::Release).configure_args;
        assert!(release.contains(&Flag("--enable-optimized")));
        assert!(!debug.contains(&Flag("--enable-optimized")));
    }
}
