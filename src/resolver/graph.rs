// src/resolver/graph.rs

//! Dependency tree expansion
//!
//! Expands one root package into a [`LeveledTree`]. The traversal keeps an
//! explicit work stack instead of recursing, and two dedup sets make it
//! terminate on cyclic and diamond-shaped graphs: every atom and every
//! key:slot pair is expanded at most once per call.

use super::conflict::{Conflict, UnresolvedDependency};
use super::matcher::AtomMatcher;
use super::plan::LeveledTree;
use super::PlanOptions;
use crate::atom::Specifier;
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::repository::{InstalledId, KeySlot, LibRef, MatchFilters, PackageMatch};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, trace};

/// Where a work item lands in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Depth(u32),
    /// Post-dependency subtree; placed after the owner's own levels
    Post(u32),
}

impl Level {
    fn below(self) -> Self {
        match self {
            Level::Depth(d) => Level::Depth(d + 1),
            Level::Post(d) => Level::Post(d + 1),
        }
    }

    fn same_kind(self, other: Level) -> bool {
        matches!(
            (self, other),
            (Level::Depth(_), Level::Depth(_)) | (Level::Post(_), Level::Post(_))
        )
    }

    /// Strictly deeper than `other` of the same kind
    fn is_below(self, other: Level) -> bool {
        match (self, other) {
            (Level::Depth(a), Level::Depth(b)) | (Level::Post(a), Level::Post(b)) => a > b,
            _ => true,
        }
    }

    fn post_of(self) -> Self {
        match self {
            Level::Depth(_) => Level::Post(1),
            Level::Post(d) => Level::Post(d + 1),
        }
    }
}

#[derive(Debug, Clone)]
enum Target {
    Atom(Specifier),
    Package(PackageMatch),
}

/// Ordering edge carried by a work item
#[derive(Debug, Clone)]
enum Link {
    /// The item is a dependency of this package
    RequiredBy(PackageMatch),
    /// The item depends on this package
    Requires(PackageMatch),
}

#[derive(Debug, Clone)]
struct WorkItem {
    level: Level,
    target: Target,
    required_by: Option<String>,
    link: Option<Link>,
}

/// Per-call traversal state
#[derive(Default)]
struct Traversal {
    /// Atom text to the package it ended up as
    treecache: HashMap<String, Option<PackageMatch>>,
    keyslotcache: HashMap<KeySlot, PackageMatch>,
    satisfied: HashMap<String, bool>,
    stack: Vec<WorkItem>,
    placed: HashMap<PackageMatch, Level>,
    /// (dependant, dependency) pairs between placed packages
    edges: Vec<(PackageMatch, PackageMatch)>,
    conflicts: BTreeMap<InstalledId, Conflict>,
    unresolved: Vec<UnresolvedDependency>,
}

impl Traversal {
    fn push(&mut self, level: Level, target: Target, required_by: Option<&str>, link: Option<Link>) {
        self.stack.push(WorkItem {
            level,
            target,
            required_by: required_by.map(str::to_string),
            link,
        });
    }

    fn connect(&mut self, node: &PackageMatch, link: Option<Link>) {
        match link {
            Some(Link::RequiredBy(owner)) => self.edges.push((owner, node.clone())),
            Some(Link::Requires(dependency)) => self.edges.push((node.clone(), dependency)),
            None => {}
        }
    }

    /// Push dependencies below their dependants
    ///
    /// Edges closing a cycle are dropped first (depth-first from the root),
    /// then levels are relaxed along the remaining edges. Normal and post
    /// levels are settled separately.
    fn settle(&mut self, root: &PackageMatch) {
        let mut adjacency: BTreeMap<&PackageMatch, Vec<&PackageMatch>> = BTreeMap::new();
        for (dependant, dependency) in &self.edges {
            let (Some(a), Some(b)) = (self.placed.get(dependant), self.placed.get(dependency))
            else {
                continue;
            };
            if dependant != dependency && a.same_kind(*b) {
                adjacency.entry(dependant).or_default().push(dependency);
            }
        }
        for targets in adjacency.values_mut() {
            targets.sort();
            targets.dedup();
        }

        // 1 = on the current path, 2 = finished
        let mut state: HashMap<&PackageMatch, u8> = HashMap::new();
        let mut dag: Vec<(PackageMatch, PackageMatch)> = Vec::new();
        let mut starts: Vec<&PackageMatch> = self.placed.keys().collect();
        starts.sort();
        starts.insert(0, root);

        for start in starts {
            if state.contains_key(start) {
                continue;
            }
            state.insert(start, 1);
            let mut path: Vec<(&PackageMatch, usize)> = vec![(start, 0)];
            while let Some((node, next)) = path.pop() {
                let targets = adjacency.get(node).map(Vec::as_slice).unwrap_or_default();
                let Some(&target) = targets.get(next) else {
                    state.insert(node, 2);
                    continue;
                };
                path.push((node, next + 1));
                match state.get(target) {
                    Some(1) => trace!("Ignoring cyclic edge {} -> {}", node, target),
                    Some(_) => dag.push((node.clone(), target.clone())),
                    None => {
                        dag.push((node.clone(), target.clone()));
                        state.insert(target, 1);
                        path.push((target, 0));
                    }
                }
            }
        }

        for _ in 0..self.placed.len() {
            let mut changed = false;
            for (dependant, dependency) in &dag {
                let above = self.placed[dependant];
                if !self.placed[dependency].is_below(above) {
                    self.placed.insert(dependency.clone(), above.below());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn into_tree(self) -> LeveledTree {
        let mut tree = LeveledTree {
            conflicts: self.conflicts,
            ..LeveledTree::default()
        };
        for (m, level) in self.placed {
            let levels = match level {
                Level::Depth(d) => tree.levels.entry(d),
                Level::Post(d) => tree.post.entry(d),
            };
            levels.or_default().insert(m);
        }
        tree
    }
}

/// Packages pulled in by a change of linked libraries
#[derive(Debug, Default)]
struct LibraryBreakage {
    /// Installed users of a bumped soname; no ordering against the candidate
    relinks: Vec<PackageMatch>,
    /// Providers of newly needed sonames; installed before the candidate
    suppliers: Vec<PackageMatch>,
}

/// Expands a root package into its leveled dependency tree
pub struct DependencyGraphBuilder<'a> {
    matcher: &'a AtomMatcher<'a>,
    config: &'a ResolverConfig,
    empty_deps: bool,
    deep: bool,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(matcher: &'a AtomMatcher<'a>, config: &'a ResolverConfig, options: &PlanOptions) -> Self {
        Self {
            matcher,
            config,
            empty_deps: options.empty_deps,
            deep: options.deep,
        }
    }

    /// Expand `root` into a leveled tree
    ///
    /// Fails with [`Error::Unresolved`] listing every atom that could not be
    /// matched anywhere in the tree.
    pub fn expand(&self, root: &PackageMatch) -> Result<LeveledTree> {
        self.expand_excluding(root, &HashSet::new())
    }

    /// Expand `root`, skipping packages already queued by earlier roots
    pub fn expand_excluding(
        &self,
        root: &PackageMatch,
        exclude: &HashSet<PackageMatch>,
    ) -> Result<LeveledTree> {
        let repos = self.matcher.repositories();

        if let Some(reason) = repos.mask_reason(root)? {
            return Err(Error::Unresolved(vec![UnresolvedDependency::new(
                format!("{} (masked: {})", repos.atom(root)?, reason),
                None,
            )]));
        }

        debug!("Expanding dependency tree of {}", root);
        let mut state = Traversal::default();
        state.push(Level::Depth(1), Target::Package(root.clone()), None, None);

        while let Some(item) = state.stack.pop() {
            let (candidate, atom_text) = match item.target {
                Target::Atom(spec) => {
                    let text = spec.to_string();
                    if let Some(known) = state.treecache.get(&text).cloned() {
                        if let Some(node) = known {
                            state.connect(&node, item.link);
                        }
                        continue;
                    }
                    state.treecache.insert(text.clone(), None);
                    if spec.negated {
                        self.handle_conflict(&mut state, &spec, item.level, item.required_by, item.link)?;
                        continue;
                    }
                    match self.matcher.best_match(&spec, &MatchFilters::default())? {
                        Some(m) => (m, Some(text)),
                        None => {
                            debug!("Cannot resolve '{}'", spec);
                            state
                                .unresolved
                                .push(UnresolvedDependency::new(text, item.required_by));
                            continue;
                        }
                    }
                }
                Target::Package(m) => (m, None),
            };

            if exclude.contains(&candidate) {
                trace!("{} already queued by an earlier request", candidate);
                continue;
            }

            let key_slot = repos.key_slot(&candidate)?;
            if let Some(existing) = state.keyslotcache.get(&key_slot).cloned() {
                if let Some(text) = atom_text {
                    state.treecache.insert(text, Some(existing.clone()));
                }
                state.connect(&existing, item.link);
                continue;
            }
            state.keyslotcache.insert(key_slot.clone(), candidate.clone());
            if let Some(text) = atom_text {
                state.treecache.insert(text, Some(candidate.clone()));
            }
            state.connect(&candidate, item.link);

            let owner = repos.atom(&candidate)?;
            let mut level = item.level;

            if self.matcher.package_action(&candidate)?.is_required() {
                let mut dependants = self.inverse_dependencies(&state, &candidate, &key_slot)?;
                for m in self.library_drops(&state, &candidate, &key_slot)? {
                    if !dependants.contains(&m) {
                        dependants.push(m);
                    }
                }
                if !dependants.is_empty() {
                    debug!("{} has {} dependants to re-evaluate", owner, dependants.len());
                    for m in dependants {
                        let link = Some(Link::Requires(candidate.clone()));
                        state.push(level, Target::Package(m), Some(&owner), link);
                    }
                    // Dependants stay at this level; the package moves below them
                    level = level.below();
                }

                let breakage = self.library_breakages(&state, &candidate, &key_slot)?;
                for m in breakage.relinks {
                    state.push(level, Target::Package(m), Some(&owner), None);
                }
                for m in breakage.suppliers {
                    let link = Some(Link::RequiredBy(candidate.clone()));
                    state.push(level.below(), Target::Package(m), Some(&owner), link);
                }
            }

            trace!("Placing {} at {:?}", owner, level);
            state.placed.insert(candidate.clone(), level);

            for dep in repos.dependencies(&candidate)? {
                if !dep.negated && self.is_satisfied(&mut state, &dep)? {
                    continue;
                }
                let link = Some(Link::RequiredBy(candidate.clone()));
                state.push(level.below(), Target::Atom(dep), Some(&owner), link);
            }

            for dep in repos.post_dependencies(&candidate)? {
                if !dep.negated && self.is_satisfied(&mut state, &dep)? {
                    continue;
                }
                let link = Some(Link::RequiredBy(candidate.clone()));
                state.push(level.post_of(), Target::Atom(dep), Some(&owner), link);
            }
        }

        if !state.unresolved.is_empty() {
            return Err(Error::Unresolved(state.unresolved));
        }

        state.settle(root);
        let tree = state.into_tree();
        debug!(
            "Tree of {} holds {} packages and {} conflicts",
            root,
            tree.len(),
            tree.conflicts.len()
        );
        Ok(tree)
    }

    fn handle_conflict(
        &self,
        state: &mut Traversal,
        spec: &Specifier,
        level: Level,
        required_by: Option<String>,
        link: Option<Link>,
    ) -> Result<()> {
        let positive = spec.positive();
        let Some(installed_id) = self.matcher.installed().atom_match(&positive, None) else {
            trace!("Conflict '{}' matches nothing installed", spec);
            return Ok(());
        };

        if let Some(replacement) = self.conflict_replacement(&positive, installed_id)? {
            debug!(
                "Conflict '{}' resolved by replacing installed {} with {}",
                spec, installed_id, replacement
            );
            state.push(level, Target::Package(replacement), required_by.as_deref(), link);
            return Ok(());
        }

        debug!("Installed {} blocked by '{}'", installed_id, spec);
        state
            .conflicts
            .entry(installed_id)
            .or_insert_with(|| Conflict::Blocker {
                installed: installed_id,
                atom: spec.to_string(),
                blocked_by: required_by.unwrap_or_default(),
            });
        Ok(())
    }

    /// A same-key package that no longer matches the conflict atom
    fn conflict_replacement(
        &self,
        conflict: &Specifier,
        installed_id: InstalledId,
    ) -> Result<Option<PackageMatch>> {
        if conflict.is_just_name() {
            return Ok(None);
        }

        let repos = self.matcher.repositories();
        let key_slot = self.matcher.installed().key_slot(installed_id)?;
        let by_key = Specifier::from_key(&key_slot.key);

        let replacement = match self
            .matcher
            .best_match(&by_key, &MatchFilters::default().with_slot(key_slot.slot.clone()))?
        {
            Some(m) => m,
            None => match self.matcher.best_match(&by_key, &MatchFilters::default())? {
                Some(m) => m,
                None => return Ok(None),
            },
        };

        if self.matcher.best_match(conflict, &MatchFilters::default())? == Some(replacement.clone()) {
            return Ok(None);
        }

        let replacement_slot = repos.key_slot(&replacement)?;
        let triple = repos.version_triple(&replacement)?;
        if conflict.accepts(&replacement_slot.key, &replacement_slot.slot, &triple) {
            return Ok(None);
        }

        if !self.deep && !self.matcher.package_action(&replacement)?.is_required() {
            return Ok(None);
        }

        Ok(Some(replacement))
    }

    /// Installed dependants of `key_slot` that do not accept `candidate`
    /// and have an actionable update of their own
    fn inverse_dependencies(
        &self,
        state: &Traversal,
        candidate: &PackageMatch,
        key_slot: &KeySlot,
    ) -> Result<Vec<PackageMatch>> {
        let installed = self.matcher.installed();
        let Some((installed_id, _)) =
            installed.version_triple_for_key_slot(&key_slot.key, &key_slot.slot)
        else {
            return Ok(Vec::new());
        };

        let triple = self.matcher.repositories().version_triple(candidate)?;
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for dependant in installed.reverse_dependencies(installed_id) {
            let dependant_slot = installed.key_slot(dependant)?;
            if &dependant_slot == key_slot
                || state.keyslotcache.contains_key(&dependant_slot)
                || !seen.insert(dependant_slot.clone())
            {
                continue;
            }

            let accepts_candidate = installed.dependencies(dependant)?.iter().any(|dep| {
                !dep.negated && dep.accepts(&key_slot.key, &key_slot.slot, &triple)
            });
            if accepts_candidate {
                continue;
            }

            if let Some(m) = self.actionable_update(&dependant_slot)? {
                found.push(m);
            }
        }

        Ok(found)
    }

    /// Updates for installed packages that link against a library the
    /// installed version of `key_slot` provides and `candidate` no longer does
    fn library_drops(
        &self,
        state: &Traversal,
        candidate: &PackageMatch,
        key_slot: &KeySlot,
    ) -> Result<Vec<PackageMatch>> {
        let installed = self.matcher.installed();
        let Some((installed_id, _)) =
            installed.version_triple_for_key_slot(&key_slot.key, &key_slot.slot)
        else {
            return Ok(Vec::new());
        };

        let kept: BTreeSet<LibRef> = self
            .matcher
            .repositories()
            .provided_libraries(candidate)?
            .into_iter()
            .collect();
        let dropped: Vec<LibRef> = installed
            .provided_libraries(installed_id)?
            .into_iter()
            .filter(|lib| !kept.contains(lib))
            .collect();

        let mut users: BTreeSet<InstalledId> = BTreeSet::new();
        for lib in &dropped {
            users.extend(installed.search_needed(lib));
        }
        users.remove(&installed_id);

        let mut seen: HashSet<KeySlot> = HashSet::new();
        let mut found = Vec::new();
        for user in users {
            let user_slot = installed.key_slot(user)?;
            if &user_slot == key_slot
                || state.keyslotcache.contains_key(&user_slot)
                || !seen.insert(user_slot.clone())
            {
                continue;
            }
            match self.actionable_update(&user_slot)? {
                Some(m) if &m != candidate => {
                    debug!("{} loses a library dropped by {}", user_slot, candidate);
                    found.push(m);
                }
                _ => trace!("{} would break but has no update", user_slot),
            }
        }

        Ok(found)
    }

    /// Packages whose shared-library links change with `candidate`
    ///
    /// Installed users of a soname that the candidate bumps are re-matched by
    /// key:slot and returned as `relinks`. Sonames the candidate newly needs
    /// are looked up in repository priority order; a supplier only counts
    /// when it is also what one of the candidate's dependencies matches.
    /// Only actionable matches are returned.
    fn library_breakages(
        &self,
        state: &Traversal,
        candidate: &PackageMatch,
        key_slot: &KeySlot,
    ) -> Result<LibraryBreakage> {
        let installed = self.matcher.installed();
        let repos = self.matcher.repositories();
        let mut breakage = LibraryBreakage::default();
        let Some((installed_id, _)) =
            installed.version_triple_for_key_slot(&key_slot.key, &key_slot.slot)
        else {
            return Ok(breakage);
        };

        let old: BTreeSet<LibRef> = installed.needed_libraries(installed_id)?.into_iter().collect();
        let new: BTreeSet<LibRef> = repos.needed_libraries(candidate)?.into_iter().collect();
        if old == new {
            return Ok(breakage);
        }

        let mut seen: HashSet<KeySlot> = HashSet::new();

        let added: Vec<&LibRef> = new.difference(&old).collect();
        if !added.is_empty() {
            let mut matched_deps: HashSet<PackageMatch> = HashSet::new();
            for dep in repos.dependencies(candidate)? {
                if dep.negated {
                    continue;
                }
                if let Some(m) = self.matcher.best_match(&dep, &MatchFilters::default())? {
                    matched_deps.insert(m);
                }
            }

            for lib in added {
                let supplier = repos
                    .resolve_needed(lib)?
                    .into_iter()
                    .filter(|m| m != candidate && matched_deps.contains(m))
                    .find(|m| repos.key_slot(m).is_ok_and(|slot| &slot != key_slot));
                let Some(supplier) = supplier else {
                    debug!("No dependency of {} supplies {}", key_slot, lib);
                    continue;
                };
                let supplier_slot = repos.key_slot(&supplier)?;
                if state.keyslotcache.contains_key(&supplier_slot)
                    || !seen.insert(supplier_slot)
                {
                    continue;
                }
                if self.matcher.package_action(&supplier)?.is_required() {
                    debug!("{} newly needs {} from {}", key_slot, lib, supplier);
                    breakage.suppliers.push(supplier);
                }
            }
        }

        for lib in old.difference(&new) {
            let bumped = new
                .iter()
                .any(|n| n.elf_class == lib.elf_class && n.library_name() == lib.library_name());
            if !bumped {
                continue;
            }
            for user in installed.search_needed(lib) {
                if user == installed_id {
                    continue;
                }
                let user_slot = installed.key_slot(user)?;
                if state.keyslotcache.contains_key(&user_slot) || !seen.insert(user_slot.clone()) {
                    continue;
                }
                if let Some(m) = self.actionable_update(&user_slot)? {
                    if &m == candidate || breakage.suppliers.contains(&m) {
                        continue;
                    }
                    debug!("{} links {} which {} bumps", user_slot, lib, key_slot);
                    breakage.relinks.push(m);
                }
            }
        }

        Ok(breakage)
    }

    fn actionable_update(&self, key_slot: &KeySlot) -> Result<Option<PackageMatch>> {
        let spec = Specifier::from_key(&key_slot.key);
        let filters = MatchFilters::default().with_slot(key_slot.slot.clone());
        match self.matcher.best_match(&spec, &filters)? {
            Some(m) if self.matcher.package_action(&m)?.is_required() => Ok(Some(m)),
            _ => Ok(None),
        }
    }

    fn is_satisfied(&self, state: &mut Traversal, dep: &Specifier) -> Result<bool> {
        if self.empty_deps {
            return Ok(false);
        }
        let key = dep.to_string();
        if let Some(&known) = state.satisfied.get(&key) {
            return Ok(known);
        }
        let satisfied = self.check_satisfied(dep)?;
        if satisfied {
            trace!("'{}' already satisfied", dep);
        }
        state.satisfied.insert(key, satisfied);
        Ok(satisfied)
    }

    /// Whether the installed set already satisfies `dep`
    ///
    /// Outside deep mode any installed match counts, unless the atom asks for
    /// the latest revision. Otherwise the installed triple has to equal the
    /// best repository match in its slot; externally synced installs accept
    /// any revision of the same version and tag.
    fn check_satisfied(&self, dep: &Specifier) -> Result<bool> {
        let installed = self.matcher.installed();
        let Some(installed_id) = installed.atom_match(dep, None) else {
            return Ok(false);
        };

        if !self.deep && !dep.wants_latest() {
            return Ok(true);
        }

        let slot = installed.key_slot(installed_id)?.slot;
        let Some(best) = self
            .matcher
            .best_match(dep, &MatchFilters::default().with_slot(slot))?
        else {
            return Ok(true);
        };

        let available = self.matcher.repositories().version_triple(&best)?;
        let current = installed.version_triple(installed_id)?;
        if available == current {
            return Ok(true);
        }

        if current.revision == self.config.synced_revision {
            if available.version == current.version && available.tag == current.tag {
                return Ok(true);
            }
            if self.config.ignore_synced_downgrades && available.compare(&current) == Ordering::Less
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Universe;

    fn expand(doc: &str, root: PackageMatch, options: &PlanOptions) -> Result<LeveledTree> {
        let universe = Universe::parse(doc).unwrap();
        let config = ResolverConfig::default();
        let matcher = AtomMatcher::new(&universe.repositories, &universe.installed);
        DependencyGraphBuilder::new(&matcher, &config, options).expand(&root)
    }

    fn level_ids(tree: &LeveledTree, level: u32) -> Vec<i64> {
        tree.levels
            .get(&level)
            .map(|set| set.iter().map(|m| m.package_id).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_expand_cycle_and_diamond_terminates() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
dependencies = ["app/b", "app/c"]

[[repository.package]]
key = "app/b"
version = "1"
dependencies = ["app/d"]

[[repository.package]]
key = "app/c"
version = "1"
dependencies = [">=app/d-1"]

[[repository.package]]
key = "app/d"
version = "1"
dependencies = ["app/a"]
"#;
        let tree = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(level_ids(&tree, 1), vec![1]);
        assert_eq!(level_ids(&tree, 2), vec![2, 3]);
        assert_eq!(level_ids(&tree, 3), vec![4]);
    }

    #[test]
    fn test_expand_shared_dependency_sinks_below_dependants() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
dependencies = ["app/b", "lib/d"]

[[repository.package]]
key = "app/b"
version = "1"
dependencies = ["lib/d"]

[[repository.package]]
key = "lib/d"
version = "1"
"#;
        let tree = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(level_ids(&tree, 1), vec![1]);
        assert_eq!(level_ids(&tree, 2), vec![2]);
        assert_eq!(level_ids(&tree, 3), vec![3]);
    }

    #[test]
    fn test_expand_collects_every_unresolved_atom() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
dependencies = ["app/missing", "app/b"]

[[repository.package]]
key = "app/b"
version = "1"
dependencies = [">=app/gone-2"]
"#;
        let err = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap_err();
        let Error::Unresolved(list) = err else {
            panic!("expected unresolved, got {:?}", err);
        };
        let atoms: BTreeSet<String> = list.iter().map(|u| u.atom.clone()).collect();
        assert_eq!(
            atoms,
            BTreeSet::from(["app/missing".to_string(), ">=app/gone-2".to_string()])
        );
        let gone = list.iter().find(|u| u.atom == ">=app/gone-2").unwrap();
        assert_eq!(gone.required_by.as_deref(), Some("app/b-1"));
    }

    #[test]
    fn test_expand_skips_satisfied_unless_empty_deps() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
dependencies = ["lib/x"]

[[repository.package]]
key = "lib/x"
version = "2"

[[installed]]
key = "lib/x"
version = "1"
"#;
        let tree = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(tree.len(), 1);

        let deep = PlanOptions {
            deep: true,
            ..PlanOptions::default()
        };
        let tree = expand(doc, PackageMatch::new(1, "main"), &deep).unwrap();
        assert_eq!(level_ids(&tree, 2), vec![2]);

        let empty = PlanOptions {
            empty_deps: true,
            ..PlanOptions::default()
        };
        let tree = expand(doc, PackageMatch::new(1, "main"), &empty).unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_expand_always_latest_rechecks() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
dependencies = ["lib/x~-1"]

[[repository.package]]
key = "lib/x"
version = "1"
revision = 2

[[installed]]
key = "lib/x"
version = "1"
revision = 1
"#;
        let tree = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(level_ids(&tree, 2), vec![2]);
    }

    #[test]
    fn test_expand_synced_revision_counts_as_satisfied() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
dependencies = ["lib/x~-1"]

[[repository.package]]
key = "lib/x"
version = "1"
revision = 2

[[installed]]
key = "lib/x"
version = "1"
revision = 9999
"#;
        let tree = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_expand_post_dependencies() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
post_dependencies = ["app/plugin"]

[[repository.package]]
key = "app/plugin"
version = "1"
dependencies = ["app/helper"]

[[repository.package]]
key = "app/helper"
version = "1"
"#;
        let tree = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(level_ids(&tree, 1), vec![1]);
        let post: Vec<(u32, i64)> = tree
            .post
            .iter()
            .flat_map(|(level, set)| set.iter().map(move |m| (*level, m.package_id)))
            .collect();
        assert_eq!(post, vec![(1, 2), (2, 3)]);
    }

    #[test]
    fn test_expand_masked_root_is_unresolved() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
mask = "repository_mask"
"#;
        let err = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Unresolved(ref list) if list.len() == 1));
    }

    #[test]
    fn test_expand_library_upgrade_pulls_consumers() {
        let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "lib/openssl"
version = "3"
provides = ["libssl.so.3"]

[[repository.package]]
key = "app/curl"
version = "2"
dependencies = ["lib/openssl"]
needed = ["libssl.so.3"]

[[installed]]
key = "lib/openssl"
version = "1"
provides = ["libssl.so.1"]

[[installed]]
key = "app/curl"
version = "1"
needed = ["libssl.so.1"]
"#;
        let tree = expand(doc, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(level_ids(&tree, 1), vec![2]);
        assert_eq!(level_ids(&tree, 2), vec![1]);
    }

    #[test]
    fn test_expand_supplier_must_be_a_dependency() {
        let without_dep = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/tool"
version = "2"
needed = ["libfoo.so.2"]

[[repository.package]]
key = "lib/foo"
version = "2"
provides = ["libfoo.so.2"]

[[installed]]
key = "app/tool"
version = "1"
needed = ["libfoo.so.1"]

[[installed]]
key = "lib/foo"
version = "1"
provides = ["libfoo.so.1"]
"#;
        let tree = expand(without_dep, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(tree.len(), 1);

        let with_dep = without_dep.replacen(
            "needed = [\"libfoo.so.2\"]",
            "needed = [\"libfoo.so.2\"]\ndependencies = [\"lib/foo\"]",
            1,
        );
        let tree = expand(&with_dep, PackageMatch::new(1, "main"), &PlanOptions::default()).unwrap();
        assert_eq!(level_ids(&tree, 1), vec![1]);
        assert_eq!(level_ids(&tree, 2), vec![2]);
    }
}
