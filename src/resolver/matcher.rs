// src/resolver/matcher.rs

//! Atom matching across prioritized repositories
//!
//! Every repository in scope is asked for its best match; when several
//! answer, [`PackageSelector`] breaks the tie. Results can be memoised in a
//! [`ResultCache`], and cached results are re-validated against the
//! repositories before they are returned.

use super::cache::{MatchCache, ResultCache};
use super::PackageAction;
use crate::atom::Specifier;
use crate::error::{Error, Result};
use crate::repository::{
    Candidate, InstalledStore, MaskReason, MatchFilters, PackageMatch, PackageSelector,
    RepositoryId, RepositorySet, RepositoryStore,
};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, trace, warn};

/// Outcome of matching one atom
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "matches", rename_all = "snake_case")]
pub enum MatchResult {
    /// Best match first; more than one only when `multi` was requested
    Found(Vec<PackageMatch>),
    NotFound,
    /// Candidates exist but masking hides all of them
    Masked(Vec<(PackageMatch, MaskReason)>),
}

impl MatchResult {
    pub fn best(&self) -> Option<&PackageMatch> {
        match self {
            MatchResult::Found(matches) => matches.first(),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, MatchResult::Found(m) if !m.is_empty())
    }

    /// Convert into the crate's error taxonomy
    pub fn into_result(self, atom: &str) -> Result<Vec<PackageMatch>> {
        match self {
            MatchResult::Found(matches) => Ok(matches),
            MatchResult::NotFound => Err(Error::NotFound(atom.to_string())),
            MatchResult::Masked(candidates) => Err(Error::Masked {
                atom: atom.to_string(),
                candidates,
            }),
        }
    }

    fn referenced(&self) -> Vec<&PackageMatch> {
        match self {
            MatchResult::Found(matches) => matches.iter().collect(),
            MatchResult::NotFound => Vec::new(),
            MatchResult::Masked(candidates) => candidates.iter().map(|(m, _)| m).collect(),
        }
    }
}

/// Resolves atoms to concrete packages
pub struct AtomMatcher<'a> {
    repositories: &'a RepositorySet,
    installed: &'a dyn InstalledStore,
    cache: Option<&'a dyn ResultCache<MatchResult>>,
}

impl<'a> AtomMatcher<'a> {
    pub fn new(repositories: &'a RepositorySet, installed: &'a dyn InstalledStore) -> Self {
        Self {
            repositories,
            installed,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn ResultCache<MatchResult>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn repositories(&self) -> &'a RepositorySet {
        self.repositories
    }

    pub fn installed(&self) -> &'a dyn InstalledStore {
        self.installed
    }

    /// Repositories to query, in priority order
    ///
    /// The atom's own `@repo` list and the filter restriction are intersected
    /// when both are present.
    fn scope(&self, spec: &Specifier, filters: &MatchFilters) -> Vec<&'a dyn RepositoryStore> {
        let restriction: Option<Vec<RepositoryId>> =
            match (&spec.repositories, &filters.repositories) {
                (Some(ours), Some(theirs)) => Some(
                    ours.iter()
                        .filter(|id| theirs.contains(id))
                        .cloned()
                        .collect(),
                ),
                (Some(ids), None) | (None, Some(ids)) => Some(ids.clone()),
                (None, None) => None,
            };

        if let Some(ids) = &restriction {
            for id in ids {
                if self.repositories.priority(id).is_none() {
                    warn!("Ignoring unknown repository '{}' in restriction of '{}'", id, spec);
                }
            }
        }

        self.repositories
            .iter()
            .filter(|repo| restriction.as_ref().is_none_or(|ids| ids.contains(repo.id())))
            .collect()
    }

    fn cache_key(spec: &Specifier, filters: &MatchFilters, scope: &[&dyn RepositoryStore]) -> String {
        let spec_text = spec.to_string();
        let filter_text = format!("{:?}", filters);
        let repo_state: Vec<String> = scope
            .iter()
            .map(|repo| format!("{}={}", repo.id(), repo.checksum()))
            .collect();

        let mut parts: Vec<&str> = vec![&spec_text, &filter_text];
        parts.extend(repo_state.iter().map(String::as_str));
        MatchCache::<MatchResult>::compute_key(&parts)
    }

    /// Every package the result points at still exists
    fn still_valid(&self, result: &MatchResult) -> bool {
        result
            .referenced()
            .into_iter()
            .all(|m| self.repositories.contains(m))
    }

    /// Match an atom against the repositories
    pub fn match_atom(&self, spec: &Specifier, filters: &MatchFilters) -> Result<MatchResult> {
        let scope = self.scope(spec, filters);
        let key = self
            .cache
            .map(|_| Self::cache_key(spec, filters, &scope));

        if let (Some(cache), Some(key)) = (self.cache, key.as_deref()) {
            if let Some(cached) = cache.get(key) {
                if self.still_valid(&cached) {
                    trace!("Match cache hit for '{}'", spec);
                    return Ok(cached);
                }
                debug!("Dropping stale cached match for '{}'", spec);
                cache.invalidate(key);
            }
        }

        let result = self.match_uncached(spec, filters, &scope)?;

        if let (Some(cache), Some(key)) = (self.cache, key) {
            cache.put(key, result.clone());
        }

        Ok(result)
    }

    fn match_uncached(
        &self,
        spec: &Specifier,
        filters: &MatchFilters,
        scope: &[&'a dyn RepositoryStore],
    ) -> Result<MatchResult> {
        let single = MatchFilters {
            multi: false,
            multi_repo: false,
            ..filters.clone()
        };

        let mut candidates = Vec::new();
        for repo in scope {
            if let Some(&id) = repo.atom_match(spec, &single)?.first() {
                candidates.push(Candidate {
                    package: PackageMatch::new(id, repo.id().clone()),
                    triple: repo.version_triple(id)?,
                    injected: repo.is_injected(),
                    priority: self.repositories.priority(repo.id()).unwrap_or(usize::MAX),
                });
            }
        }

        let winner = match candidates.len() {
            0 => return self.masked_candidates(spec, filters, scope),
            1 => candidates.pop(),
            _ => PackageSelector::select_best(candidates),
        };
        let Some(winner) = winner else {
            return Ok(MatchResult::NotFound);
        };

        if !filters.multi {
            return Ok(MatchResult::Found(vec![winner.package]));
        }

        let every = MatchFilters {
            multi: true,
            ..single
        };
        // The winning repository leads so that the best match stays first
        let mut sources: Vec<&dyn RepositoryStore> =
            vec![self.repositories.get(&winner.package.repository)?];
        if filters.multi_repo {
            sources.extend(
                scope
                    .iter()
                    .copied()
                    .filter(|repo| *repo.id() != winner.package.repository),
            );
        }

        let mut all = Vec::new();
        for repo in sources {
            for id in repo.atom_match(spec, &every)? {
                all.push(PackageMatch::new(id, repo.id().clone()));
            }
        }
        Ok(MatchResult::Found(all))
    }

    /// Re-query with masking off to explain an empty result
    fn masked_candidates(
        &self,
        spec: &Specifier,
        filters: &MatchFilters,
        scope: &[&'a dyn RepositoryStore],
    ) -> Result<MatchResult> {
        if !filters.apply_masking {
            return Ok(MatchResult::NotFound);
        }

        let unmasked = MatchFilters {
            apply_masking: false,
            multi: true,
            ..filters.clone()
        };

        let mut masked = Vec::new();
        for repo in scope {
            for id in repo.atom_match(spec, &unmasked)? {
                if let Some(reason) = repo.mask_reason(id) {
                    masked.push((PackageMatch::new(id, repo.id().clone()), reason));
                }
            }
        }

        if masked.is_empty() {
            Ok(MatchResult::NotFound)
        } else {
            debug!("'{}' only matches masked packages", spec);
            Ok(MatchResult::Masked(masked))
        }
    }

    /// Best match, if any
    pub fn best_match(&self, spec: &Specifier, filters: &MatchFilters) -> Result<Option<PackageMatch>> {
        Ok(self.match_atom(spec, filters)?.best().cloned())
    }

    /// Match independent atoms in parallel
    ///
    /// Results come back in the order of `specs`.
    pub fn match_many(&self, specs: &[Specifier], filters: &MatchFilters) -> Vec<Result<MatchResult>> {
        specs
            .par_iter()
            .map(|spec| self.match_atom(spec, filters))
            .collect()
    }

    /// What applying `m` would do to the installed package in its key:slot
    pub fn package_action(&self, m: &PackageMatch) -> Result<PackageAction> {
        let key_slot = self.repositories.key_slot(m)?;
        let Some((_, installed)) = self
            .installed
            .version_triple_for_key_slot(&key_slot.key, &key_slot.slot)
        else {
            return Ok(PackageAction::Install);
        };

        let candidate = self.repositories.version_triple(m)?;
        Ok(match candidate.compare(&installed) {
            Ordering::Greater => PackageAction::Upgrade,
            Ordering::Less => PackageAction::Downgrade,
            Ordering::Equal => PackageAction::NoOp,
        })
    }
}
