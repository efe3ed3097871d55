//! CLI command implementations

pub mod build;
pub mod plan;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use miette::Result;

use crate::component::Component;
use crate::config::Config;
use crate::configuration::Configuration;
use crate::matrix::BuildMatrix;

/// Options describing the build matrix, overriding `llvmbuild.toml`
#[derive(Debug, Default, Args)]
pub struct MatrixArgs {
    /// Source tree to build (repeatable)
    #[arg(long = "src", value_name = "DIR")]
    pub sources: Vec<Utf8PathBuf>,

    /// Branch subdirectory inside every component checkout (repeatable)
    #[arg(long = "branch", value_name = "NAME")]
    pub branches: Vec<String>,

    /// Flavor to build: debug, release or paranoid (repeatable)
    #[arg(long = "flavor", value_name = "FLAVOR")]
    pub flavors: Vec<String>,

    /// C compiler used for host builds
    #[arg(long)]
    pub cc: Option<String>,

    /// C++ compiler used for host builds
    #[arg(long)]
    pub cxx: Option<String>,

    /// Make program
    #[arg(long)]
    pub make: Option<String>,

    /// Maximum number of configurations built at once
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Total make job budget shared by all running configurations
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Root of the install trees
    #[arg(long, value_name = "DIR")]
    pub install_prefix: Option<Utf8PathBuf>,

    /// Root of the build trees
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<Utf8PathBuf>,

    /// Extra configure flags for llvm, whitespace separated
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub extra_llvm_config_flags: Option<String>,

    /// Extra configure flags for llvm-gcc, whitespace separated
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub extra_llvm_gcc_config_flags: Option<String>,

    /// Extra configure flags for the second-stage llvm, whitespace separated
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub extra_llvm2_config_flags: Option<String>,

    /// Extra configure flags for gcc, whitespace separated
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub extra_gcc_config_flags: Option<String>,

    /// Extra configure flags for dragonegg, whitespace separated
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub extra_dragonegg_config_flags: Option<String>,

    /// Do not build llvm
    #[arg(long)]
    pub no_llvm: bool,

    /// Do not build llvm-gcc
    #[arg(long)]
    pub no_llvm_gcc: bool,

    /// Do not build the second-stage llvm
    #[arg(long)]
    pub no_llvm2: bool,

    /// Do not build gcc
    #[arg(long)]
    pub no_gcc: bool,

    /// Do not build dragonegg
    #[arg(long)]
    pub no_dragonegg: bool,

    /// Skip the check stage
    #[arg(long)]
    pub no_check: bool,

    /// Run configure even when the generated Makefile is up to date
    #[arg(long)]
    pub force_configure: bool,
}

impl MatrixArgs {
    /// Override file settings with the ones given on the command line
    pub fn apply(self, config: &mut Config) {
        let build = &mut config.build;
        if !self.sources.is_empty() {
            build.sources = self.sources;
        }
        if !self.branches.is_empty() {
            build.branches = self.branches;
        }
        if !self.flavors.is_empty() {
            build.flavors = self.flavors;
        }
        if let Some(cc) = self.cc {
            build.cc = cc;
        }
        if let Some(cxx) = self.cxx {
            build.cxx = cxx;
        }
        if let Some(make) = self.make {
            build.make = make;
        }
        if let Some(threads) = self.threads {
            build.threads = threads;
        }
        if let Some(jobs) = self.jobs {
            build.jobs = jobs;
        }
        if let Some(prefix) = self.install_prefix {
            build.install_prefix = prefix;
        }
        if let Some(dir) = self.build_dir {
            build.build_dir = dir;
        }
        if self.no_check {
            build.check = false;
        }
        if self.force_configure {
            build.force_configure = true;
        }

        let per_component = [
            (Component::Llvm, self.extra_llvm_config_flags, self.no_llvm),
            (Component::LlvmGcc, self.extra_llvm_gcc_config_flags, self.no_llvm_gcc),
            (Component::Llvm2, self.extra_llvm2_config_flags, self.no_llvm2),
            (Component::Gcc, self.extra_gcc_config_flags, self.no_gcc),
            (Component::Dragonegg, self.extra_dragonegg_config_flags, self.no_dragonegg),
        ];
        for (component, flags, disabled) in per_component {
            if let Some(flags) = flags {
                config.component_mut(component).extra_config_flags =
                    flags.split_whitespace().map(str::to_string).collect();
            }
            if disabled {
                config.component_mut(component).enabled = false;
            }
        }
    }
}

/// Load `llvmbuild.toml` from `workdir`, apply the command line and
/// enumerate the matrix
pub fn load_matrix(workdir: &Utf8Path, args: MatrixArgs) -> Result<BuildMatrix> {
    let mut config = Config::load(workdir)?;
    args.apply(&mut config);

    let configuration = Configuration::validate(&config, workdir)?;
    let matrix = BuildMatrix::new(configuration)?;
    Ok(matrix)
}
