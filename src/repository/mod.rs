// src/repository/mod.rs

//! Repository and installed-set query surfaces
//!
//! The resolver never touches storage directly. It talks to one
//! [`RepositoryStore`] per configured repository, held in priority order by a
//! [`RepositorySet`], and to a single [`InstalledStore`] describing what is on
//! the system. The in-memory implementations in [`memory`] back the CLI and
//! the test suite.

pub mod memory;
mod selector;

pub use memory::{MemoryInstalled, MemoryRepository, PackageRecord, Universe};
pub use selector::{Candidate, PackageSelector};

use crate::atom::Specifier;
use crate::error::{Error, Result};
use crate::version::VersionTriple;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row id of a package inside one repository
pub type PackageId = i64;

/// Row id of an installed package
pub type InstalledId = i64;

/// Name of a configured repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(String);

impl RepositoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RepositoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One package record in one repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageMatch {
    pub package_id: PackageId,
    pub repository: RepositoryId,
}

impl PackageMatch {
    pub fn new(package_id: PackageId, repository: impl Into<RepositoryId>) -> Self {
        Self {
            package_id,
            repository: repository.into(),
        }
    }
}

impl fmt::Display for PackageMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package_id, self.repository)
    }
}

/// Package key plus slot; two packages with the same pair replace each other
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct KeySlot {
    pub key: String,
    pub slot: String,
}

impl KeySlot {
    pub fn new(key: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            slot: slot.into(),
        }
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.slot)
    }
}

/// A shared library link: soname plus ELF class
///
/// Written as `libfoo.so.1` (64-bit) or `libfoo.so.1:32`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LibRef {
    pub soname: String,
    pub elf_class: u8,
}

impl LibRef {
    pub fn new(soname: impl Into<String>, elf_class: u8) -> Self {
        Self {
            soname: soname.into(),
            elf_class,
        }
    }

    /// Library name without the `.so` version tail: `libssl.so.3` → `libssl`
    pub fn library_name(&self) -> &str {
        self.soname
            .split_once(".so")
            .map_or(self.soname.as_str(), |(name, _)| name)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (soname, class) = match s.rsplit_once(':') {
            Some((soname, class)) => {
                let class = class
                    .parse()
                    .map_err(|_| Error::InvalidLibrary {
                        lib: s.to_string(),
                        reason: "bad ELF class".to_string(),
                    })?;
                (soname, class)
            }
            None => (s, 64),
        };
        if soname.is_empty() {
            return Err(Error::InvalidLibrary {
                lib: s.to_string(),
                reason: "empty library name".to_string(),
            });
        }
        Ok(Self::new(soname, class))
    }
}

impl TryFrom<String> for LibRef {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        LibRef::parse(&s)
    }
}

impl From<LibRef> for String {
    fn from(lib: LibRef) -> Self {
        lib.to_string()
    }
}

impl fmt::Display for LibRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elf_class == 64 {
            write!(f, "{}", self.soname)
        } else {
            write!(f, "{}:{}", self.soname, self.elf_class)
        }
    }
}

/// Why a package is hidden by masking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskReason {
    UserPackageMask,
    UserKeywordMask,
    SystemKeyword,
    LicenseMask,
    RepositoryMask,
    CompletelyMasked,
}

impl fmt::Display for MaskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MaskReason::UserPackageMask => "user package.mask",
            MaskReason::UserKeywordMask => "user package.keywords",
            MaskReason::SystemKeyword => "system keyword",
            MaskReason::LicenseMask => "license mask",
            MaskReason::RepositoryMask => "repository mask",
            MaskReason::CompletelyMasked => "completely masked",
        };
        write!(f, "{}", text)
    }
}

/// Filters applied on top of an atom when querying repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchFilters {
    pub case_sensitive: bool,
    pub slot: Option<String>,
    /// Only packages whose branch sorts at or below this one
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub revision: Option<u32>,
    pub apply_masking: bool,
    /// Return every match instead of the best one
    pub multi: bool,
    /// With `multi`, collect from every repository rather than the winner's
    pub multi_repo: bool,
    pub repositories: Option<Vec<RepositoryId>>,
}

impl Default for MatchFilters {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            slot: None,
            branch: None,
            tag: None,
            revision: None,
            apply_masking: true,
            multi: false,
            multi_repo: false,
            repositories: None,
        }
    }
}

impl MatchFilters {
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    pub fn with_branch(mut self, branch: Option<&str>) -> Self {
        self.branch = branch.map(str::to_string);
        self
    }

    pub fn without_masking(mut self) -> Self {
        self.apply_masking = false;
        self
    }

    pub fn all_matches(mut self, across_repositories: bool) -> Self {
        self.multi = true;
        self.multi_repo = across_repositories;
        self
    }
}

/// Query surface of one package repository
///
/// `atom_match` applies key, slot, tag, revision, branch, version-operator and
/// masking filters itself and returns ids newest first: at most one unless
/// `filters.multi` is set.
pub trait RepositoryStore: Send + Sync {
    fn id(&self) -> &RepositoryId;

    /// Transient repository wrapping a single package file
    fn is_injected(&self) -> bool {
        false
    }

    /// Content revision; changes whenever the repository does
    fn checksum(&self) -> String;

    fn atom_match(&self, spec: &Specifier, filters: &MatchFilters) -> Result<Vec<PackageId>>;

    fn contains(&self, id: PackageId) -> bool;

    fn atom(&self, id: PackageId) -> Result<String>;

    fn version_triple(&self, id: PackageId) -> Result<VersionTriple>;

    fn key_slot(&self, id: PackageId) -> Result<KeySlot>;

    fn dependencies(&self, id: PackageId) -> Result<Vec<Specifier>>;

    fn post_dependencies(&self, id: PackageId) -> Result<Vec<Specifier>>;

    fn needed_libraries(&self, id: PackageId) -> Result<Vec<LibRef>>;

    /// Shared libraries the package ships
    fn provided_libraries(&self, id: PackageId) -> Result<Vec<LibRef>>;

    /// Packages providing `lib`, newest first
    fn resolve_needed(&self, lib: &LibRef) -> Result<Vec<PackageId>>;

    /// `None` when the package is visible
    fn mask_reason(&self, id: PackageId) -> Option<MaskReason>;
}

/// Query surface of the installed package set
pub trait InstalledStore: Send + Sync {
    fn installed_ids(&self) -> Vec<InstalledId>;

    fn atom(&self, id: InstalledId) -> Result<String>;

    /// Newest installed package matching `spec`, optionally in `slot`
    fn atom_match(&self, spec: &Specifier, slot: Option<&str>) -> Option<InstalledId>;

    /// Every installed package matching `spec`
    fn match_all(&self, spec: &Specifier) -> Vec<InstalledId>;

    fn key_slot(&self, id: InstalledId) -> Result<KeySlot>;

    fn version_triple(&self, id: InstalledId) -> Result<VersionTriple>;

    fn version_triple_for_key_slot(
        &self,
        key: &str,
        slot: &str,
    ) -> Option<(InstalledId, VersionTriple)>;

    /// Carries the required-by-system marker
    fn is_system_protected(&self, id: InstalledId) -> bool;

    fn slots_of_key(&self, key: &str) -> Vec<String>;

    /// Installed packages with a direct dependency on `id`
    fn reverse_dependencies(&self, id: InstalledId) -> Vec<InstalledId>;

    fn dependencies(&self, id: InstalledId) -> Result<Vec<Specifier>>;

    fn needed_libraries(&self, id: InstalledId) -> Result<Vec<LibRef>>;

    fn provided_libraries(&self, id: InstalledId) -> Result<Vec<LibRef>>;

    /// Installed packages linking against `lib`
    fn search_needed(&self, lib: &LibRef) -> Vec<InstalledId>;
}

/// Repositories in priority order, highest first
#[derive(Default)]
pub struct RepositorySet {
    repositories: Vec<Box<dyn RepositoryStore>>,
}

impl std::fmt::Debug for RepositorySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositorySet")
            .field("repositories", &self.ids())
            .finish()
    }
}

impl RepositorySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a repository below every repository added so far
    pub fn push(&mut self, repository: Box<dyn RepositoryStore>) -> Result<()> {
        if self.priority(repository.id()).is_some() {
            return Err(Error::Config(format!(
                "repository '{}' configured twice",
                repository.id()
            )));
        }
        self.repositories.push(repository);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RepositoryStore> {
        self.repositories.iter().map(|r| r.as_ref())
    }

    pub fn ids(&self) -> Vec<RepositoryId> {
        self.iter().map(|r| r.id().clone()).collect()
    }

    /// Position in priority order, 0 being the highest
    pub fn priority(&self, id: &RepositoryId) -> Option<usize> {
        self.repositories.iter().position(|r| r.id() == id)
    }

    pub fn get(&self, id: &RepositoryId) -> Result<&dyn RepositoryStore> {
        self.iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| Error::UnknownRepository(id.to_string()))
    }

    pub fn contains(&self, m: &PackageMatch) -> bool {
        self.get(&m.repository)
            .map(|r| r.contains(m.package_id))
            .unwrap_or(false)
    }

    pub fn atom(&self, m: &PackageMatch) -> Result<String> {
        self.get(&m.repository)?.atom(m.package_id)
    }

    pub fn version_triple(&self, m: &PackageMatch) -> Result<VersionTriple> {
        self.get(&m.repository)?.version_triple(m.package_id)
    }

    pub fn key_slot(&self, m: &PackageMatch) -> Result<KeySlot> {
        self.get(&m.repository)?.key_slot(m.package_id)
    }

    pub fn dependencies(&self, m: &PackageMatch) -> Result<Vec<Specifier>> {
        self.get(&m.repository)?.dependencies(m.package_id)
    }

    pub fn post_dependencies(&self, m: &PackageMatch) -> Result<Vec<Specifier>> {
        self.get(&m.repository)?.post_dependencies(m.package_id)
    }

    pub fn needed_libraries(&self, m: &PackageMatch) -> Result<Vec<LibRef>> {
        self.get(&m.repository)?.needed_libraries(m.package_id)
    }

    pub fn provided_libraries(&self, m: &PackageMatch) -> Result<Vec<LibRef>> {
        self.get(&m.repository)?.provided_libraries(m.package_id)
    }

    pub fn mask_reason(&self, m: &PackageMatch) -> Result<Option<MaskReason>> {
        Ok(self.get(&m.repository)?.mask_reason(m.package_id))
    }

    /// Suppliers of `lib` across repositories, in priority order
    pub fn resolve_needed(&self, lib: &LibRef) -> Result<Vec<PackageMatch>> {
        let mut found = Vec::new();
        for repository in self.iter() {
            for id in repository.resolve_needed(lib)? {
                found.push(PackageMatch::new(id, repository.id().clone()));
            }
        }
        Ok(found)
    }
}
