// src/resolver/updates.rs

//! World update calculation
//!
//! Classifies every installed package against what the repositories offer:
//! up to date, updatable, or gone from every repository.

use super::matcher::AtomMatcher;
use crate::atom::Specifier;
use crate::error::Result;
use crate::repository::{InstalledId, MatchFilters, PackageMatch};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Partition of the installed set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorldUpdate {
    /// Repository packages that should replace what is installed
    pub update: Vec<PackageMatch>,
    /// Installed packages no repository offers any more
    pub remove: Vec<InstalledId>,
    /// Installed packages already matching the repositories
    pub fine: Vec<InstalledId>,
}

/// A dependency of an installed package that nothing installed satisfies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenDependency {
    pub installed: InstalledId,
    pub atom: String,
}

pub struct WorldUpdateCalculator<'a> {
    matcher: &'a AtomMatcher<'a>,
    synced_revision: u32,
}

impl<'a> WorldUpdateCalculator<'a> {
    pub fn new(matcher: &'a AtomMatcher<'a>, synced_revision: u32) -> Self {
        Self {
            matcher,
            synced_revision,
        }
    }

    /// Diff `installed` against the repositories
    ///
    /// Candidates are limited to entries at or below `branch`. With
    /// `ignore_synced_revision_only`, an install carrying the synced revision
    /// that differs from its match only by revision counts as up to date.
    pub fn diff(
        &self,
        installed: &[InstalledId],
        branch: Option<&str>,
        ignore_synced_revision_only: bool,
    ) -> Result<WorldUpdate> {
        let store = self.matcher.installed();
        let repos = self.matcher.repositories();
        let mut result = WorldUpdate::default();
        let mut queued: HashSet<PackageMatch> = HashSet::new();

        for &id in installed {
            let key_slot = store.key_slot(id)?;
            let spec = Specifier::from_key(&key_slot.key);
            let filters = MatchFilters::default().with_branch(branch);

            let in_slot = self
                .matcher
                .best_match(&spec, &filters.clone().with_slot(key_slot.slot.clone()))?;

            let Some(candidate) = in_slot else {
                match self.matcher.best_match(&spec, &filters)? {
                    Some(m) if self.matcher.package_action(&m)?.is_required() => {
                        debug!("{} moved slot, updating to {}", key_slot, m);
                        if queued.insert(m.clone()) {
                            result.update.push(m);
                        }
                    }
                    _ => {
                        debug!("{} is not available from any repository", key_slot);
                        result.remove.push(id);
                    }
                }
                continue;
            };

            let available = repos.version_triple(&candidate)?;
            let current = store.version_triple(id)?;

            if available == current {
                result.fine.push(id);
                continue;
            }

            if ignore_synced_revision_only
                && current.revision == self.synced_revision
                && available.differs_only_in_revision(&current)
            {
                debug!("{} is externally synced, keeping it", key_slot);
                result.fine.push(id);
                continue;
            }

            debug!("{} {} -> {}", key_slot, current, available);
            if queued.insert(candidate.clone()) {
                result.update.push(candidate);
            }
        }

        info!(
            "World diff: {} updates, {} removals, {} up to date",
            result.update.len(),
            result.remove.len(),
            result.fine.len()
        );
        Ok(result)
    }

    /// Dependencies of installed packages that nothing installed satisfies
    pub fn dependencies_test(&self) -> Result<Vec<BrokenDependency>> {
        let store = self.matcher.installed();
        let mut broken = Vec::new();

        for id in store.installed_ids() {
            for dep in store.dependencies(id)? {
                if dep.negated {
                    continue;
                }
                if store.atom_match(&dep, None).is_none() {
                    debug!("Installed {} has unsatisfied dependency '{}'", id, dep);
                    broken.push(BrokenDependency {
                        installed: id,
                        atom: dep.to_string(),
                    });
                }
            }
        }

        Ok(broken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Universe;

    const DOC: &str = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/current"
version = "1.0"

[[repository.package]]
key = "app/stale"
version = "2.0"

[[repository.package]]
key = "app/synced"
version = "1.0"
revision = 3

[[repository.package]]
key = "app/moved"
version = "5"
slot = "5"

[[installed]]
key = "app/current"
version = "1.0"

[[installed]]
key = "app/stale"
version = "1.0"

[[installed]]
key = "app/synced"
version = "1.0"
revision = 9999

[[installed]]
key = "app/moved"
version = "4"
slot = "4"

[[installed]]
key = "app/dropped"
version = "1"
dependencies = ["lib/missing", "app/current"]
"#;

    #[test]
    fn test_diff_partitions_installed_set() {
        let universe = Universe::parse(DOC).unwrap();
        let matcher = AtomMatcher::new(&universe.repositories, &universe.installed);
        let calculator = WorldUpdateCalculator::new(&matcher, 9999);

        let diff = calculator.diff(&[1, 2, 3, 4, 5], None, true).unwrap();
        assert_eq!(
            diff.update,
            vec![PackageMatch::new(2, "main"), PackageMatch::new(4, "main")]
        );
        assert_eq!(diff.fine, vec![1, 3]);
        assert_eq!(diff.remove, vec![5]);

        let strict = calculator.diff(&[3], None, false).unwrap();
        assert_eq!(strict.update, vec![PackageMatch::new(3, "main")]);
    }

    #[test]
    fn test_dependencies_test() {
        let universe = Universe::parse(DOC).unwrap();
        let matcher = AtomMatcher::new(&universe.repositories, &universe.installed);
        let calculator = WorldUpdateCalculator::new(&matcher, 9999);

        let broken = calculator.dependencies_test().unwrap();
        assert_eq!(
            broken,
            vec![BrokenDependency {
                installed: 5,
                atom: "lib/missing".to_string(),
            }]
        );
    }
}
