// src/resolver/removal.rs

//! Removal closure
//!
//! Starting from the packages the user asked to remove, every installed
//! package that depends on them has to go as well, level by level. The result
//! is ordered so that nothing is removed while something installed still
//! depends on it.

use crate::error::Result;
use crate::repository::{InstalledId, InstalledStore};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use tracing::{debug, trace};

pub struct RemovalClosureBuilder<'a> {
    installed: &'a dyn InstalledStore,
}

impl<'a> RemovalClosureBuilder<'a> {
    pub fn new(installed: &'a dyn InstalledStore) -> Self {
        Self { installed }
    }

    /// Required by the system and the last installed slot of its key
    pub fn is_protected(&self, id: InstalledId) -> Result<bool> {
        let key_slot = self.installed.key_slot(id)?;
        if !self.installed.is_system_protected(id) {
            return Ok(false);
        }
        Ok(self.installed.slots_of_key(&key_slot.key).len() <= 1)
    }

    /// Whether `id` may be removed at all
    pub fn validate_removal(&self, id: InstalledId) -> Result<bool> {
        Ok(!self.is_protected(id)?)
    }

    /// Everything that goes with `seed`, in removal order
    ///
    /// With `deep`, dependencies of removed packages that nothing else
    /// installed needs are removed too. Protected packages are never pulled
    /// in; the seed itself is taken as given.
    pub fn closure(&self, seed: &[InstalledId], deep: bool) -> Result<Vec<InstalledId>> {
        let mut level_of: HashMap<InstalledId, usize> = HashMap::new();
        let mut current: BTreeSet<InstalledId> = BTreeSet::new();
        for &id in seed {
            // Fails on ids the store does not hold
            self.installed.key_slot(id)?;
            current.insert(id);
            level_of.insert(id, 0);
        }

        let mut level = 0;
        while !current.is_empty() {
            let mut next: BTreeSet<InstalledId> = BTreeSet::new();

            for &id in &current {
                for dependant in self.installed.reverse_dependencies(id) {
                    if level_of.contains_key(&dependant) || next.contains(&dependant) {
                        continue;
                    }
                    if self.is_protected(dependant)? {
                        trace!("Keeping protected dependant {}", dependant);
                        continue;
                    }
                    next.insert(dependant);
                }
            }

            if deep {
                for &id in &current {
                    for orphan in self.orphaned_dependencies(id, &level_of, &next)? {
                        next.insert(orphan);
                    }
                }
            }

            level += 1;
            for &id in &next {
                level_of.insert(id, level);
            }
            if !next.is_empty() {
                debug!("Removal level {} adds {} packages", level, next.len());
            }
            current = next;
        }

        Ok(self.order(&level_of))
    }

    /// Installed dependencies of `id` whose every dependant is being removed
    fn orphaned_dependencies(
        &self,
        id: InstalledId,
        removed: &HashMap<InstalledId, usize>,
        pending: &BTreeSet<InstalledId>,
    ) -> Result<Vec<InstalledId>> {
        let gone = |x: &InstalledId| removed.contains_key(x) || pending.contains(x);
        let mut orphans = Vec::new();

        for dep in self.installed.dependencies(id)? {
            if dep.negated {
                continue;
            }
            let Some(dependency) = self.installed.atom_match(&dep, None) else {
                continue;
            };
            if gone(&dependency) || orphans.contains(&dependency) {
                continue;
            }
            if !self
                .installed
                .reverse_dependencies(dependency)
                .iter()
                .all(|x| gone(x))
            {
                continue;
            }
            if self.is_protected(dependency)? {
                continue;
            }
            trace!("{} is orphaned by removing {}", dependency, id);
            orphans.push(dependency);
        }

        Ok(orphans)
    }

    /// Dependants before dependencies; deeper levels first among peers
    ///
    /// Members of a dependency cycle are released highest level first.
    fn order(&self, level_of: &HashMap<InstalledId, usize>) -> Vec<InstalledId> {
        let mut in_degree: HashMap<InstalledId, usize> = level_of.keys().map(|&id| (id, 0)).collect();
        let mut dependencies: HashMap<InstalledId, Vec<InstalledId>> = HashMap::new();

        for &id in level_of.keys() {
            let dependants: HashSet<InstalledId> = self
                .installed
                .reverse_dependencies(id)
                .into_iter()
                .filter(|d| *d != id && level_of.contains_key(d))
                .collect();
            for dependant in dependants {
                dependencies.entry(dependant).or_default().push(id);
                if let Some(degree) = in_degree.get_mut(&id) {
                    *degree += 1;
                }
            }
        }

        let priority = |id: InstalledId| (level_of[&id], Reverse(id));
        let mut ready: BinaryHeap<(usize, Reverse<InstalledId>)> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&id, _)| priority(id))
            .collect();

        let mut done: HashSet<InstalledId> = HashSet::new();
        let mut result = Vec::with_capacity(level_of.len());

        while result.len() < level_of.len() {
            let id = match ready.pop() {
                Some((_, Reverse(id))) => id,
                None => {
                    // Cycle: release the deepest remaining member
                    let Some(id) = level_of
                        .keys()
                        .filter(|id| !done.contains(id))
                        .copied()
                        .max_by_key(|&id| priority(id))
                    else {
                        break;
                    };
                    debug!("Breaking removal cycle at {}", id);
                    id
                }
            };
            if !done.insert(id) {
                continue;
            }
            result.push(id);

            for &dependency in dependencies.get(&id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(&dependency) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 && !done.contains(&dependency) {
                        ready.push(priority(dependency));
                    }
                }
            }
        }

        result
    }
}
