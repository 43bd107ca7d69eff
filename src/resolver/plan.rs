// src/resolver/plan.rs

//! Resolution result data structures

use super::conflict::Conflict;
use crate::repository::{InstalledId, PackageMatch};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Output of expanding one root
///
/// `levels` are depths: the root sits at 1, its dependencies at 2 and so on.
/// Post-dependencies form their own depth map in `post`. `conflicts` is the
/// level-0 set of installed packages that have to go.
#[derive(Debug, Clone, Default)]
pub struct LeveledTree {
    pub levels: BTreeMap<u32, BTreeSet<PackageMatch>>,
    pub post: BTreeMap<u32, BTreeSet<PackageMatch>>,
    pub conflicts: BTreeMap<InstalledId, Conflict>,
}

impl LeveledTree {
    /// Deepest normal level, 0 when empty
    pub fn depth(&self) -> u32 {
        self.levels.keys().next_back().copied().unwrap_or(0)
    }

    /// Deepest post-dependency level, 0 when there are none
    pub fn post_depth(&self) -> u32 {
        self.post.keys().next_back().copied().unwrap_or(0)
    }

    /// Every package in the tree, normal levels first
    pub fn matches(&self) -> impl Iterator<Item = &PackageMatch> {
        self.levels
            .values()
            .chain(self.post.values())
            .flat_map(|set| set.iter())
    }

    pub fn contains(&self, m: &PackageMatch) -> bool {
        self.matches().any(|x| x == m)
    }

    pub fn len(&self) -> usize {
        self.matches().count()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.post.is_empty() && self.conflicts.is_empty()
    }

    /// Install order of this tree alone: deepest first, post-dependencies last
    ///
    /// Returns the packages with their position counted from 1.
    pub fn install_levels(&self) -> Vec<(u32, &BTreeSet<PackageMatch>)> {
        let depth = self.depth();
        let post_depth = self.post_depth();
        let mut ordered: Vec<(u32, &BTreeSet<PackageMatch>)> = self
            .levels
            .iter()
            .map(|(level, set)| (depth - level + 1, set))
            .chain(
                self.post
                    .iter()
                    .map(|(level, set)| (depth + post_depth - level + 1, set)),
            )
            .collect();
        ordered.sort_by_key(|(position, _)| *position);
        ordered
    }
}

/// Ordered install queue plus the installed packages to remove
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallPlan {
    /// Dependencies before dependants
    pub queue: Vec<PackageMatch>,
    pub removal: Vec<InstalledId>,
    /// Why each installed package is removed or replaced
    pub conflicts: Vec<Conflict>,
}

impl InstallPlan {
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.removal.is_empty()
    }
}

/// Result of a full system update
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorldPlan {
    pub plan: InstallPlan,
    /// Installed packages no repository offers any more
    pub obsolete: Vec<InstalledId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_levels_inverts_depth() {
        let mut tree = LeveledTree::default();
        tree.levels
            .entry(1)
            .or_default()
            .insert(PackageMatch::new(1, "main"));
        tree.levels
            .entry(2)
            .or_default()
            .insert(PackageMatch::new(2, "main"));
        tree.levels
            .entry(3)
            .or_default()
            .insert(PackageMatch::new(3, "main"));
        tree.post
            .entry(1)
            .or_default()
            .insert(PackageMatch::new(4, "main"));

        let order: Vec<(u32, i64)> = tree
            .install_levels()
            .into_iter()
            .flat_map(|(pos, set)| set.iter().map(move |m| (pos, m.package_id)))
            .collect();
        assert_eq!(order, vec![(1, 3), (2, 2), (3, 1), (4, 4)]);
        assert_eq!(tree.len(), 4);
        assert!(tree.contains(&PackageMatch::new(4, "main")));
    }
}
