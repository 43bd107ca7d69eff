// src/error.rs

//! Error types for dependency resolution

use crate::repository::{InstalledId, MaskReason, PackageId, PackageMatch};
use crate::resolver::UnresolvedDependency;
use thiserror::Error;

/// Errors raised by the resolver and its reference stores
#[derive(Error, Debug)]
pub enum Error {
    /// No candidate matches the specifier in any repository
    #[error("No package matches '{0}'")]
    NotFound(String),

    /// Candidates exist but every one of them is filtered by masking policy
    #[error("All candidates for '{atom}' are masked: {}", describe_masked(.candidates))]
    Masked {
        atom: String,
        candidates: Vec<(PackageMatch, MaskReason)>,
    },

    /// Dependency atoms that could not be matched while expanding a request
    #[error("Unresolved dependencies: {}", describe_unresolved(.0))]
    Unresolved(Vec<UnresolvedDependency>),

    #[error("Invalid specifier '{spec}': {reason}")]
    InvalidSpecifier { spec: String, reason: String },

    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    #[error("Invalid library reference '{lib}': {reason}")]
    InvalidLibrary { lib: String, reason: String },

    #[error("Unknown repository '{0}'")]
    UnknownRepository(String),

    /// A store was asked about a package id it does not hold
    #[error("Package {id} not found in repository {repository}")]
    MissingPackage { id: PackageId, repository: String },

    #[error("Installed package {0} not found")]
    MissingInstalled(InstalledId),

    #[error("Resolution deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, Error>;

fn describe_masked(candidates: &[(PackageMatch, MaskReason)]) -> String {
    candidates
        .iter()
        .map(|(m, reason)| format!("{} ({})", m, reason))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_unresolved(unresolved: &[UnresolvedDependency]) -> String {
    unresolved
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
