//! Error types for llvmbuild

// This warning is a false positive from thiserror macro expansion
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for llvmbuild operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for llvmbuild
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration error, detected before any task is enqueued
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[help]
        help: String,
    },

    /// No unique label could be derived for a set of paths
    #[error("Abbreviation error: {message}")]
    Abbreviation {
        message: String,
        #[help]
        help: String,
    },

    /// A required build tool is missing or not executable
    #[error("Required tool not found: {tool}")]
    ToolMissing {
        tool: String,
        #[help]
        help: String,
    },

    /// Circular dependency between toolchain components
    #[error("Circular component dependency detected: {components:?}")]
    #[diagnostic(help("Check the dependency declarations of the toolchain components"))]
    CircularDependency {
        /// Components involved in the cycle
        components: Vec<String>,
    },

    /// Build report error
    #[error("Report error: {message}")]
    Report {
        message: String,
        #[help]
        help: String,
    },

    /// Build error
    #[error("Build error: {message}")]
    Build {
        message: String,
        #[help]
        help: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create an abbreviation error
    pub fn abbreviation(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Abbreviation {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a missing tool error
    pub fn tool_missing(tool: impl Into<String>, help: impl Into<String>) -> Self {
        Self::ToolMissing {
            tool: tool.into(),
            help: help.into(),
        }
    }

    /// Create a circular dependency error
    pub fn circular_dependency(components: Vec<String>) -> Self {
        Self::CircularDependency { components }
    }

    /// Create a report error
    pub fn report(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a build error
    pub fn build(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Whether this error stems from invalid user configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::Abbreviation { .. }
                | Self::CircularDependency { .. }
                | Self::TomlParse(_)
        )
    }
}
