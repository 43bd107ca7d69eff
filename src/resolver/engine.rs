// src/resolver/engine.rs

//! Install queue planning
//!
//! The [`Resolver`] expands every requested root with the
//! [`DependencyGraphBuilder`] and merges the per-root trees into one ordered
//! queue. Trees are merged in request order: each tree is inverted so its
//! deepest dependencies come first, then shifted past everything queued for
//! earlier roots.

use super::cache::ResultCache;
use super::conflict::{Conflict, UnresolvedDependency};
use super::graph::DependencyGraphBuilder;
use super::matcher::{AtomMatcher, MatchResult};
use super::plan::{InstallPlan, WorldPlan};
use super::updates::WorldUpdateCalculator;
use super::PlanOptions;
use crate::atom::Specifier;
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::repository::{
    InstalledId, InstalledStore, KeySlot, MatchFilters, PackageMatch, RepositorySet,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One root of an install request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// A package the caller already picked
    Match(PackageMatch),
    /// An atom to resolve against the repositories first
    Spec(Specifier),
}

impl From<PackageMatch> for Request {
    fn from(m: PackageMatch) -> Self {
        Request::Match(m)
    }
}

impl From<Specifier> for Request {
    fn from(spec: Specifier) -> Self {
        Request::Spec(spec)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Match(m) => write!(f, "{}", m),
            Request::Spec(spec) => write!(f, "{}", spec),
        }
    }
}

/// Plans install queues and system updates
pub struct Resolver<'a> {
    matcher: AtomMatcher<'a>,
    config: &'a ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(
        repositories: &'a RepositorySet,
        installed: &'a dyn InstalledStore,
        config: &'a ResolverConfig,
    ) -> Self {
        Self {
            matcher: AtomMatcher::new(repositories, installed),
            config,
        }
    }

    /// Memoise atom matches across calls
    pub fn with_cache(mut self, cache: &'a dyn ResultCache<MatchResult>) -> Self {
        self.matcher = self.matcher.with_cache(cache);
        self
    }

    pub fn matcher(&self) -> &AtomMatcher<'a> {
        &self.matcher
    }

    pub fn config(&self) -> &ResolverConfig {
        self.config
    }

    /// Forced packages that are neither installed nor queued as a no-op
    fn forced_roots(&self) -> Result<Vec<PackageMatch>> {
        let mut roots = Vec::new();
        for spec in self.config.forced_specifiers() {
            if self.matcher.installed().atom_match(&spec, None).is_some() {
                continue;
            }
            match self.matcher.best_match(&spec, &MatchFilters::default())? {
                Some(m) if self.matcher.package_action(&m)?.is_required() => {
                    debug!("Forced package '{}' pulls in {}", spec, m);
                    roots.push(m);
                }
                Some(_) => {}
                None => warn!("Forced package '{}' is not available", spec),
            }
        }
        Ok(roots)
    }

    /// Build the install queue for a set of requests
    ///
    /// Every root is expanded even after one fails, so a returned
    /// [`Error::Unresolved`] lists all missing atoms of the request.
    pub fn plan(&self, requests: &[Request], options: &PlanOptions) -> Result<InstallPlan> {
        let mut unresolved: Vec<UnresolvedDependency> = Vec::new();
        let mut roots = self.forced_roots()?;

        for request in requests {
            let m = match request {
                Request::Match(m) => m.clone(),
                Request::Spec(spec) => match self.matcher.match_atom(spec, &MatchFilters::default())? {
                    MatchResult::Found(found) => match found.into_iter().next() {
                        Some(m) => m,
                        None => {
                            unresolved.push(UnresolvedDependency::new(spec.to_string(), None));
                            continue;
                        }
                    },
                    MatchResult::NotFound => {
                        unresolved.push(UnresolvedDependency::new(spec.to_string(), None));
                        continue;
                    }
                    MatchResult::Masked(candidates) => {
                        warn!(
                            "'{}' only matches masked packages ({} candidates)",
                            spec,
                            candidates.len()
                        );
                        unresolved.push(UnresolvedDependency::new(spec.to_string(), None));
                        continue;
                    }
                },
            };
            if !roots.contains(&m) {
                roots.push(m);
            }
        }

        info!("Planning install of {} root packages", roots.len());

        let builder = DependencyGraphBuilder::new(&self.matcher, self.config, options);
        let repos = self.matcher.repositories();

        let mut queued: HashSet<PackageMatch> = HashSet::new();
        let mut queued_slots: HashMap<KeySlot, PackageMatch> = HashMap::new();
        let mut levels: BTreeMap<u32, BTreeSet<PackageMatch>> = BTreeMap::new();
        let mut conflicts: BTreeMap<InstalledId, Conflict> = BTreeMap::new();
        let mut offset = 0;

        for root in &roots {
            if options.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!("Deadline passed while planning {}", root);
                return Err(Error::DeadlineExceeded);
            }
            if queued.contains(root) {
                continue;
            }

            let tree = match builder.expand_excluding(root, &queued) {
                Ok(tree) => tree,
                Err(Error::Unresolved(missing)) => {
                    debug!("{} has {} unresolved dependencies", root, missing.len());
                    unresolved.extend(missing);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for (position, set) in tree.install_levels() {
                for m in set {
                    let key_slot = repos.key_slot(m)?;
                    if let Some(existing) = queued_slots.get(&key_slot) {
                        if existing != m {
                            warn!(
                                "{} and {} both fill {}; keeping {}",
                                existing, m, key_slot, existing
                            );
                        }
                        continue;
                    }
                    queued_slots.insert(key_slot, m.clone());
                    queued.insert(m.clone());
                    levels.entry(offset + position).or_default().insert(m.clone());
                }
            }
            offset += tree.depth() + tree.post_depth();

            for (id, conflict) in tree.conflicts {
                conflicts.entry(id).or_insert(conflict);
            }
        }

        if !unresolved.is_empty() {
            return Err(Error::Unresolved(unresolved));
        }

        let queue: Vec<PackageMatch> = levels.into_values().flatten().collect();

        // A blocked install whose key:slot is also being queued is replaced in
        // place rather than removed
        let installed = self.matcher.installed();
        let mut removal = Vec::new();
        let mut reported = Vec::new();
        for (id, conflict) in conflicts {
            let key_slot = installed.key_slot(id)?;
            if queued_slots.contains_key(&key_slot) {
                debug!("Installed {} is replaced by the queue", id);
                reported.push(Conflict::Replaced {
                    installed: id,
                    key_slot,
                });
            } else {
                removal.push(id);
                reported.push(conflict);
            }
        }

        info!(
            "Install queue holds {} packages, {} to remove",
            queue.len(),
            removal.len()
        );

        Ok(InstallPlan {
            queue,
            removal,
            conflicts: reported,
        })
    }

    /// Plan a full system update
    ///
    /// Installed packages are diffed against the repositories (limited to
    /// `branch`), the outdated ones are planned like an install request, and
    /// installs that no repository offers any more are reported as obsolete.
    pub fn world_queue(&self, branch: Option<&str>, options: &PlanOptions) -> Result<WorldPlan> {
        let installed = self.matcher.installed();
        let calculator = WorldUpdateCalculator::new(&self.matcher, self.config.synced_revision);
        let update = calculator.diff(
            &installed.installed_ids(),
            branch,
            self.config.ignore_synced_revision,
        )?;

        let requests: Vec<Request> = update.update.iter().cloned().map(Request::Match).collect();
        let plan = self.plan(&requests, options)?;

        let repos = self.matcher.repositories();
        let queued_slots: HashSet<KeySlot> = plan
            .queue
            .iter()
            .map(|m| repos.key_slot(m))
            .collect::<Result<_>>()?;

        let mut obsolete = Vec::new();
        for id in update.remove {
            if plan.removal.contains(&id) || queued_slots.contains(&installed.key_slot(id)?) {
                continue;
            }
            obsolete.push(id);
        }

        info!(
            "World update: {} to install, {} obsolete, {} up to date",
            plan.queue.len(),
            obsolete.len(),
            update.fine.len()
        );

        Ok(WorldPlan { plan, obsolete })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Universe;
    use std::time::Duration;

    const DOC: &str = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
dependencies = ["lib/c"]

[[repository.package]]
key = "app/b"
version = "1"
dependencies = ["lib/c"]

[[repository.package]]
key = "lib/c"
version = "1"

[[repository.package]]
key = "app/base"
version = "1"
"#;

    fn spec(s: &str) -> Request {
        Request::Spec(Specifier::parse(s).unwrap())
    }

    #[test]
    fn test_plan_shares_dependencies_between_roots() {
        let universe = Universe::parse(DOC).unwrap();
        let config = ResolverConfig::default();
        let resolver = Resolver::new(&universe.repositories, &universe.installed, &config);

        let plan = resolver
            .plan(&[spec("app/a"), spec("app/b")], &PlanOptions::default())
            .unwrap();
        let ids: Vec<i64> = plan.queue.iter().map(|m| m.package_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(plan.removal.is_empty());
    }

    #[test]
    fn test_plan_prepends_forced_packages() {
        let universe = Universe::parse(DOC).unwrap();
        let config = ResolverConfig {
            forced: vec!["app/base".to_string(), "app/unknown".to_string()],
            ..ResolverConfig::default()
        };
        let resolver = Resolver::new(&universe.repositories, &universe.installed, &config);

        let plan = resolver.plan(&[spec("lib/c")], &PlanOptions::default()).unwrap();
        let ids: Vec<i64> = plan.queue.iter().map(|m| m.package_id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[test]
    fn test_plan_reports_unknown_roots() {
        let universe = Universe::parse(DOC).unwrap();
        let config = ResolverConfig::default();
        let resolver = Resolver::new(&universe.repositories, &universe.installed, &config);

        let err = resolver
            .plan(&[spec("app/nope"), spec("app/a"), spec("app/gone")], &PlanOptions::default())
            .unwrap_err();
        let Error::Unresolved(list) = err else {
            panic!("expected unresolved, got {:?}", err);
        };
        let atoms: Vec<&str> = list.iter().map(|u| u.atom.as_str()).collect();
        assert_eq!(atoms, vec!["app/nope", "app/gone"]);
    }

    #[test]
    fn test_plan_deadline() {
        let universe = Universe::parse(DOC).unwrap();
        let config = ResolverConfig::default();
        let resolver = Resolver::new(&universe.repositories, &universe.installed, &config);

        let options = PlanOptions {
            deadline: Instant::now().checked_sub(Duration::from_secs(1)),
            ..PlanOptions::default()
        };
        assert!(options.deadline.is_some());
        assert!(matches!(
            resolver.plan(&[spec("app/a")], &options),
            Err(Error::DeadlineExceeded)
        ));
    }

    #[test]
    fn test_request_display() {
        assert_eq!(Request::from(PackageMatch::new(3, "main")).to_string(), "3@main");
        assert_eq!(spec(">=app/a-1").to_string(), ">=app/a-1");
    }
}
