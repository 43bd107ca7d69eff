// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pkgsolve::{PackageMatch, RepositoryStore, Specifier, Universe};
use std::io::Write;
use tempfile::NamedTempFile;

/// Parse a universe document, panicking on malformed fixtures.
pub fn universe(doc: &str) -> Universe {
    Universe::parse(doc).unwrap()
}

/// Write a fixture to disk.
///
/// Returns the NamedTempFile - keep it alive to prevent cleanup.
pub fn universe_file(doc: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(doc.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn spec(atom: &str) -> Specifier {
    Specifier::parse(atom).unwrap()
}

/// Display atoms of repository matches, for readable assertions.
pub fn atoms(universe: &Universe, matches: &[PackageMatch]) -> Vec<String> {
    matches
        .iter()
        .map(|m| universe.repositories.atom(m).unwrap())
        .collect()
}

/// Repository match for the package `key-version` in repository `repo`.
pub fn find(universe: &Universe, repo: &str, atom: &str) -> PackageMatch {
    let store: &dyn RepositoryStore = universe.repositories.get(&repo.into()).unwrap();
    let filters = pkgsolve::MatchFilters::default().without_masking();
    let id = store
        .atom_match(&spec(&format!("={}", atom)), &filters)
        .unwrap()
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("{} not in {}", atom, repo));
    PackageMatch::new(id, repo)
}

/// Two repositories and a small installed set.
///
/// `main` has priority over `extra`. Installed ids: 1 = app/foo-1.0,
/// 2 = app/user-1 (depends on app/foo), 3 = sys/base-1 (system).
pub const TWO_REPOS: &str = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/foo"
version = "1.2"
dependencies = [">=lib/bar-2"]

[[repository.package]]
key = "lib/bar"
version = "2.1"
dependencies = ["lib/baz"]

[[repository.package]]
key = "lib/baz"
version = "1"

[[repository]]
id = "extra"

[[repository.package]]
key = "app/foo"
version = "1.1"

[[repository.package]]
key = "lib/bar"
version = "2.5"

[[installed]]
key = "app/foo"
version = "1.0"

[[installed]]
key = "app/user"
version = "1"
dependencies = ["app/foo"]

[[installed]]
key = "sys/base"
version = "1"
system = true
"#;
