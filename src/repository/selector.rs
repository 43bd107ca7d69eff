// src/repository/selector.rs

//! Package selection across repositories
//!
//! When more than one repository offers a match for the same atom, the
//! selector decides which one wins.

use super::PackageMatch;
use crate::version::{compare_tags, VersionTriple};
use std::cmp::Ordering;
use tracing::{debug, info};

/// One repository's best match for an atom
#[derive(Debug, Clone)]
pub struct Candidate {
    pub package: PackageMatch,
    pub triple: VersionTriple,
    /// Comes from a transient single-package-file repository
    pub injected: bool,
    /// Position of the repository in priority order, 0 first
    pub priority: usize,
}

/// Package selector for choosing the best match from several repositories
pub struct PackageSelector;

impl PackageSelector {
    /// Select the best candidate
    ///
    /// Selection criteria (in order):
    /// 1. Injected package-file repositories always win
    /// 2. Highest version
    /// 3. Highest tag
    /// 4. Highest revision
    /// 5. Repository priority (earliest configured wins)
    ///
    /// The result does not depend on the order of `candidates`.
    pub fn select_best(candidates: Vec<Candidate>) -> Option<Candidate> {
        if candidates.len() <= 1 {
            return candidates.into_iter().next();
        }

        let injected: Vec<Candidate> = candidates.iter().filter(|c| c.injected).cloned().collect();
        let mut remaining = if injected.is_empty() {
            candidates
        } else {
            debug!("{} injected candidates take precedence", injected.len());
            injected
        };

        remaining = keep_max(remaining, |a, b| a.triple.version.cmp(&b.triple.version));
        remaining = keep_max(remaining, |a, b| compare_tags(&a.triple.tag, &b.triple.tag));
        remaining = keep_max(remaining, |a, b| a.triple.revision.cmp(&b.triple.revision));

        let selected = remaining.into_iter().min_by_key(|c| c.priority)?;
        info!(
            "Selected package {} ({}) from repository {} (priority {})",
            selected.package.package_id,
            selected.triple,
            selected.package.repository,
            selected.priority
        );

        Some(selected)
    }
}

/// Keep only the candidates that tie for the maximum under `cmp`
fn keep_max(
    candidates: Vec<Candidate>,
    cmp: impl Fn(&Candidate, &Candidate) -> Ordering,
) -> Vec<Candidate> {
    let Some(best) = candidates.iter().max_by(|a, b| cmp(a, b)).cloned() else {
        return candidates;
    };
    candidates
        .into_iter()
        .filter(|c| cmp(c, &best) == Ordering::Equal)
        .collect()
}
