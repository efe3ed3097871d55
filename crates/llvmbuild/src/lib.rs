//! llvmbuild - builds a matrix of LLVM toolchain configurations
//!
//! This crate provides both a library and CLI for llvmbuild, including:
//! - Configuration file parsing and merging
//! - Validation of source trees, compilers and component selection
//! - Short, unique labels for source trees and branches
//! - Parallel configure, build, install and check of every
//!   (source, branch, flavor) combination
//! - A JSON report of every run

pub mod abbrev;
pub mod build;
pub mod commands;
pub mod component;
pub mod config;
pub mod configuration;
pub mod error;
pub mod matrix;

pub use error::{Error, Result};
