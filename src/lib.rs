// src/lib.rs

//! pkgsolve: dependency resolution for source-and-binary package managers
//!
//! Given prioritized package repositories and the installed package set,
//! pkgsolve turns requests into concrete packages and ordered work:
//!
//! - Atom matching: `>=app-misc/foo-1.2:0#5.10~3@main` to the best package
//!   across repositories
//! - Install queues: dependencies first, conflicts collected for removal
//! - Removal closures: dependants first, system packages protected
//! - World updates: which installed packages are outdated or gone
//!
//! # Architecture
//!
//! - Storage-agnostic: the resolver only sees the [`repository::RepositoryStore`]
//!   and [`repository::InstalledStore`] traits
//! - Single-threaded per call; independent atoms can be matched in parallel
//! - Optional match cache, re-validated against the repositories on every hit

pub mod atom;
pub mod config;
mod error;
pub mod repository;
pub mod resolver;
pub mod version;

pub use atom::{Operator, Revision, Specifier};
pub use config::ResolverConfig;
pub use error::{Error, Result};
pub use repository::{
    InstalledId, InstalledStore, KeySlot, MatchFilters, PackageId, PackageMatch, RepositoryId,
    RepositorySet, RepositoryStore, Universe,
};
pub use resolver::{
    AtomMatcher, DependencyGraphBuilder, InstallPlan, MatchCache, MatchResult, PackageAction,
    PlanOptions, RemovalClosureBuilder, Request, Resolver, WorldPlan, WorldUpdateCalculator,
};
pub use version::{compare_tags, compare_versions, Version, VersionTriple};
