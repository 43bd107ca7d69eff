// src/resolver/conflict.rs

//! Failure and conflict types for dependency resolution

use crate::repository::{InstalledId, KeySlot};
use serde::Serialize;

/// A dependency atom that no repository could satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDependency {
    pub atom: String,
    /// Atom of the package that pulled it in, when known
    pub required_by: Option<String>,
}

impl UnresolvedDependency {
    pub fn new(atom: impl Into<String>, required_by: Option<String>) -> Self {
        Self {
            atom: atom.into(),
            required_by,
        }
    }
}

impl std::fmt::Display for UnresolvedDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.required_by {
            Some(parent) => write!(f, "{} (required by {})", self.atom, parent),
            None => write!(f, "{}", self.atom),
        }
    }
}

/// An installed package that has to make way for the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    /// A `!atom` dependency matched an installed package with no replacement
    Blocker {
        installed: InstalledId,
        atom: String,
        blocked_by: String,
    },
    /// The same key:slot is about to be replaced by a queued package
    Replaced { installed: InstalledId, key_slot: KeySlot },
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::Blocker {
                installed,
                atom,
                blocked_by,
            } => write!(
                f,
                "Installed package {} matches conflict {} declared by {}",
                installed, atom, blocked_by
            ),
            Conflict::Replaced {
                installed,
                key_slot,
            } => write!(
                f,
                "Installed package {} is replaced in place ({})",
                installed, key_slot
            ),
        }
    }
}
