// src/repository/memory.rs

//! In-memory repository and installed-set stores
//!
//! A [`Universe`] is read from a TOML document listing repositories in
//! priority order and the installed packages:
//!
//! ```toml
//! [[repository]]
//! id = "main"
//!
//! [[repository.package]]
//! key = "app/foo"
//! version = "1.2"
//! dependencies = [">=lib/bar-2"]
//!
//! [[installed]]
//! key = "app/foo"
//! version = "1.0"
//! ```
//!
//! Package ids are assigned from 1 in document order, per repository and for
//! the installed set.

use super::{
    InstalledId, InstalledStore, KeySlot, LibRef, MaskReason, MatchFilters, PackageId,
    RepositoryId, RepositorySet, RepositoryStore,
};
use crate::atom::Specifier;
use crate::error::{Error, Result};
use crate::version::{compare_tags, sort_newest_first, Version, VersionTriple};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

fn default_slot() -> String {
    "0".to_string()
}

/// One package as stored in a repository or in the installed set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    pub key: String,
    pub version: Version,
    #[serde(default = "default_slot")]
    pub slot: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<Specifier>,
    #[serde(default)]
    pub post_dependencies: Vec<Specifier>,
    /// Shared libraries the package links against
    #[serde(default)]
    pub needed: Vec<LibRef>,
    /// Shared libraries the package ships
    #[serde(default)]
    pub provides: Vec<LibRef>,
    #[serde(default)]
    pub mask: Option<MaskReason>,
    /// Required-by-system marker (installed set only)
    #[serde(default)]
    pub system: bool,
}

impl PackageRecord {
    pub fn new(key: &str, version: Version) -> Self {
        Self {
            key: key.to_string(),
            version,
            slot: default_slot(),
            tag: String::new(),
            revision: 0,
            branch: None,
            dependencies: Vec::new(),
            post_dependencies: Vec::new(),
            needed: Vec::new(),
            provides: Vec::new(),
            mask: None,
            system: false,
        }
    }

    pub fn slot(mut self, slot: &str) -> Self {
        self.slot = slot.to_string();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    pub fn depends(mut self, spec: Specifier) -> Self {
        self.dependencies.push(spec);
        self
    }

    pub fn masked(mut self, reason: MaskReason) -> Self {
        self.mask = Some(reason);
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn triple(&self) -> VersionTriple {
        VersionTriple::new(self.version.clone(), self.tag.clone(), self.revision)
    }

    pub fn key_slot(&self) -> KeySlot {
        KeySlot::new(self.key.clone(), self.slot.clone())
    }

    /// Display atom, e.g. `app/foo-1.2#5.10`
    pub fn atom(&self) -> String {
        if self.tag.is_empty() {
            format!("{}-{}", self.key, self.version)
        } else {
            format!("{}-{}#{}", self.key, self.version, self.tag)
        }
    }

    fn satisfies(&self, spec: &Specifier, case_sensitive: bool) -> bool {
        spec.matches_key(&self.key, case_sensitive)
            && spec.slot.as_deref().is_none_or(|s| s == self.slot)
            && spec.matches_version(&self.triple())
    }

    fn passes(&self, filters: &MatchFilters) -> bool {
        let branch_ok = match (&filters.branch, &self.branch) {
            (Some(limit), Some(branch)) => compare_tags(branch, limit) != Ordering::Greater,
            _ => true,
        };
        branch_ok
            && filters.slot.as_deref().is_none_or(|s| s == self.slot)
            && filters.tag.as_deref().is_none_or(|t| t == self.tag)
            && filters.revision.is_none_or(|r| r == self.revision)
            && !(filters.apply_masking && self.mask.is_some())
    }
}

/// Newest-first ids of the records accepted by `keep`
fn newest_first<'a>(
    records: impl Iterator<Item = (&'a i64, &'a PackageRecord)>,
    keep: impl Fn(&PackageRecord) -> bool,
) -> Vec<i64> {
    let mut found: Vec<(i64, VersionTriple)> = records
        .filter(|(_, record)| keep(record))
        .map(|(id, record)| (*id, record.triple()))
        .collect();
    sort_newest_first(&mut found, |(_, triple)| triple);
    found.into_iter().map(|(id, _)| id).collect()
}

/// A repository held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    id: RepositoryId,
    injected: bool,
    revision: u64,
    packages: BTreeMap<PackageId, PackageRecord>,
    next_id: PackageId,
}

impl MemoryRepository {
    pub fn new(id: &str) -> Self {
        Self {
            id: RepositoryId::from(id),
            injected: false,
            revision: 0,
            packages: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Mark as a transient single-package-file repository
    pub fn injected(mut self) -> Self {
        self.injected = true;
        self
    }

    /// Set the content revision reported through the checksum
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn add(&mut self, record: PackageRecord) -> PackageId {
        let id = self.next_id;
        self.next_id += 1;
        self.packages.insert(id, record);
        id
    }

    /// Drop a record without touching the content revision
    pub fn remove(&mut self, id: PackageId) -> Option<PackageRecord> {
        self.packages.remove(&id)
    }

    fn record(&self, id: PackageId) -> Result<&PackageRecord> {
        self.packages.get(&id).ok_or_else(|| Error::MissingPackage {
            id,
            repository: self.id.to_string(),
        })
    }
}

impl RepositoryStore for MemoryRepository {
    fn id(&self) -> &RepositoryId {
        &self.id
    }

    fn is_injected(&self) -> bool {
        self.injected
    }

    fn checksum(&self) -> String {
        format!("{}:{}", self.id, self.revision)
    }

    fn atom_match(&self, spec: &Specifier, filters: &MatchFilters) -> Result<Vec<PackageId>> {
        let mut ids = newest_first(self.packages.iter(), |record| {
            record.satisfies(spec, filters.case_sensitive) && record.passes(filters)
        });
        if !filters.multi {
            ids.truncate(1);
        }
        debug!("{}: '{}' matched {:?}", self.id, spec, ids);
        Ok(ids)
    }

    fn contains(&self, id: PackageId) -> bool {
        self.packages.contains_key(&id)
    }

    fn atom(&self, id: PackageId) -> Result<String> {
        Ok(self.record(id)?.atom())
    }

    fn version_triple(&self, id: PackageId) -> Result<VersionTriple> {
        Ok(self.record(id)?.triple())
    }

    fn key_slot(&self, id: PackageId) -> Result<KeySlot> {
        Ok(self.record(id)?.key_slot())
    }

    fn dependencies(&self, id: PackageId) -> Result<Vec<Specifier>> {
        Ok(self.record(id)?.dependencies.clone())
    }

    fn post_dependencies(&self, id: PackageId) -> Result<Vec<Specifier>> {
        Ok(self.record(id)?.post_dependencies.clone())
    }

    fn needed_libraries(&self, id: PackageId) -> Result<Vec<LibRef>> {
        Ok(self.record(id)?.needed.clone())
    }

    fn provided_libraries(&self, id: PackageId) -> Result<Vec<LibRef>> {
        Ok(self.record(id)?.provides.clone())
    }

    fn resolve_needed(&self, lib: &LibRef) -> Result<Vec<PackageId>> {
        Ok(newest_first(self.packages.iter(), |record| {
            record.mask.is_none() && record.provides.contains(lib)
        }))
    }

    fn mask_reason(&self, id: PackageId) -> Option<MaskReason> {
        self.packages.get(&id).and_then(|record| record.mask)
    }
}

/// The installed package set held in memory
#[derive(Debug, Clone)]
pub struct MemoryInstalled {
    packages: BTreeMap<InstalledId, PackageRecord>,
    next_id: InstalledId,
}

impl Default for MemoryInstalled {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInstalled {
    pub fn new() -> Self {
        Self {
            packages: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, record: PackageRecord) -> InstalledId {
        let id = self.next_id;
        self.next_id += 1;
        self.packages.insert(id, record);
        id
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    fn record(&self, id: InstalledId) -> Result<&PackageRecord> {
        self.packages.get(&id).ok_or(Error::MissingInstalled(id))
    }
}

impl InstalledStore for MemoryInstalled {
    fn installed_ids(&self) -> Vec<InstalledId> {
        self.packages.keys().copied().collect()
    }

    fn atom(&self, id: InstalledId) -> Result<String> {
        Ok(self.record(id)?.atom())
    }

    fn atom_match(&self, spec: &Specifier, slot: Option<&str>) -> Option<InstalledId> {
        newest_first(self.packages.iter(), |record| {
            record.satisfies(spec, true) && slot.is_none_or(|s| s == record.slot)
        })
        .into_iter()
        .next()
    }

    fn match_all(&self, spec: &Specifier) -> Vec<InstalledId> {
        newest_first(self.packages.iter(), |record| record.satisfies(spec, true))
    }

    fn key_slot(&self, id: InstalledId) -> Result<KeySlot> {
        Ok(self.record(id)?.key_slot())
    }

    fn version_triple(&self, id: InstalledId) -> Result<VersionTriple> {
        Ok(self.record(id)?.triple())
    }

    fn version_triple_for_key_slot(
        &self,
        key: &str,
        slot: &str,
    ) -> Option<(InstalledId, VersionTriple)> {
        self.packages
            .iter()
            .find(|(_, record)| record.key == key && record.slot == slot)
            .map(|(id, record)| (*id, record.triple()))
    }

    fn is_system_protected(&self, id: InstalledId) -> bool {
        self.packages.get(&id).is_some_and(|record| record.system)
    }

    fn slots_of_key(&self, key: &str) -> Vec<String> {
        self.packages
            .values()
            .filter(|record| record.key == key)
            .map(|record| record.slot.clone())
            .collect()
    }

    fn reverse_dependencies(&self, id: InstalledId) -> Vec<InstalledId> {
        let Some(target) = self.packages.get(&id) else {
            return Vec::new();
        };
        let triple = target.triple();
        self.packages
            .iter()
            .filter(|(other, record)| {
                **other != id
                    && record.dependencies.iter().any(|dep| {
                        !dep.negated && dep.accepts(&target.key, &target.slot, &triple)
                    })
            })
            .map(|(other, _)| *other)
            .collect()
    }

    fn dependencies(&self, id: InstalledId) -> Result<Vec<Specifier>> {
        Ok(self.record(id)?.dependencies.clone())
    }

    fn needed_libraries(&self, id: InstalledId) -> Result<Vec<LibRef>> {
        Ok(self.record(id)?.needed.clone())
    }

    fn provided_libraries(&self, id: InstalledId) -> Result<Vec<LibRef>> {
        Ok(self.record(id)?.provides.clone())
    }

    fn search_needed(&self, lib: &LibRef) -> Vec<InstalledId> {
        self.packages
            .iter()
            .filter(|(_, record)| record.needed.contains(lib))
            .map(|(id, _)| *id)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryDocument {
    id: String,
    #[serde(default)]
    injected: bool,
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    package: Vec<PackageRecord>,
}

#[derive(Debug, Deserialize)]
struct UniverseDocument {
    #[serde(default)]
    repository: Vec<RepositoryDocument>,
    #[serde(default)]
    installed: Vec<PackageRecord>,
}

/// Repositories plus installed set, loaded from one TOML document
#[derive(Debug)]
pub struct Universe {
    pub repositories: RepositorySet,
    pub installed: MemoryInstalled,
}

impl Universe {
    /// Load a universe from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a universe from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let document: UniverseDocument = toml::from_str(content)?;

        let mut repositories = RepositorySet::new();
        for doc in document.repository {
            let mut repository = MemoryRepository::new(&doc.id).with_revision(doc.revision);
            if doc.injected {
                repository = repository.injected();
            }
            for record in doc.package {
                repository.add(record);
            }
            repositories.push(Box::new(repository))?;
        }

        let mut installed = MemoryInstalled::new();
        for record in document.installed {
            installed.add(record);
        }

        debug!(
            "Loaded universe with {} repositories and {} installed packages",
            repositories.len(),
            installed.len()
        );

        Ok(Self {
            repositories,
            installed,
        })
    }
}
