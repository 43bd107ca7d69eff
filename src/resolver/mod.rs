// src/resolver/mod.rs

//! Dependency resolution
//!
//! This module turns user requests into concrete packages and ordered
//! queues:
//!
//! - [`AtomMatcher`] resolves an atom to the best package across repositories
//! - [`DependencyGraphBuilder`] expands one package into a leveled tree
//! - [`Resolver`] merges the trees of many roots into an install queue
//! - [`RemovalClosureBuilder`] orders the removal of installed packages
//! - [`WorldUpdateCalculator`] diffs the installed set against repositories

mod cache;
mod conflict;
mod engine;
mod graph;
mod matcher;
mod plan;
mod removal;
mod updates;

pub use cache::{MatchCache, ResultCache};
pub use conflict::{Conflict, UnresolvedDependency};
pub use engine::{Request, Resolver};
pub use graph::DependencyGraphBuilder;
pub use matcher::{AtomMatcher, MatchResult};
pub use plan::{InstallPlan, LeveledTree, WorldPlan};
pub use removal::RemovalClosureBuilder;
pub use updates::{BrokenDependency, WorldUpdate, WorldUpdateCalculator};

use serde::Serialize;
use std::time::Instant;

/// What installing a package would do to the installed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageAction {
    /// The same version is already installed in this key:slot
    NoOp,
    Install,
    Upgrade,
    Downgrade,
}

impl PackageAction {
    pub fn is_required(self) -> bool {
        self != PackageAction::NoOp
    }
}

/// Options for expanding and planning installs
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Queue every dependency, installed or not
    pub empty_deps: bool,
    /// Re-check installed dependencies against the newest available package
    pub deep: bool,
    /// Give up between roots once this instant has passed
    pub deadline: Option<Instant>,
}
