// tests/resolve.rs

//! Integration tests for matching and install queue planning.

mod common;

use common::{atoms, find, spec, universe, universe_file, TWO_REPOS};
use pkgsolve::resolver::Conflict;
use pkgsolve::{
    AtomMatcher, Error, InstalledStore, KeySlot, MatchFilters, PackageMatch, PlanOptions,
    Request, Resolver, ResolverConfig, Universe, WorldUpdateCalculator,
};
use std::collections::HashSet;

fn plan(u: &Universe, atoms: &[&str]) -> pkgsolve::Result<pkgsolve::InstallPlan> {
    let config = ResolverConfig::default();
    let resolver = Resolver::new(&u.repositories, &u.installed, &config);
    let requests: Vec<Request> = atoms.iter().map(|a| Request::Spec(spec(a))).collect();
    resolver.plan(&requests, &PlanOptions::default())
}

#[test]
fn test_upgrade_binds_newest_match_across_repositories() {
    let doc = r#"
[[repository]]
id = "a"

[[repository.package]]
key = "app/foo"
version = "1.2"

[[repository]]
id = "b"

[[repository.package]]
key = "app/foo"
version = "1.1"

[[installed]]
key = "app/foo"
version = "1.0"
"#;
    let u = universe(doc);
    let config = ResolverConfig::default();
    let matcher = AtomMatcher::new(&u.repositories, &u.installed);
    let calculator = WorldUpdateCalculator::new(&matcher, config.synced_revision);

    let diff = calculator.diff(&u.installed.installed_ids(), None, true).unwrap();
    let newest = find(&u, "a", "app/foo-1.2");
    assert_eq!(diff.update, vec![newest.clone()]);
    assert!(diff.remove.is_empty());
    assert!(diff.fine.is_empty());

    let resolver = Resolver::new(&u.repositories, &u.installed, &config);
    let plan = resolver
        .plan(&[Request::Match(newest.clone())], &PlanOptions::default())
        .unwrap();
    assert_eq!(plan.queue, vec![newest]);
    assert!(plan.removal.is_empty());
}

#[test]
fn test_dependencies_queue_before_dependants() {
    let u = universe(TWO_REPOS);
    let plan = plan(&u, &["app/foo"]).unwrap();
    assert_eq!(atoms(&u, &plan.queue), vec!["lib/bar-2.5", "app/foo-1.2"]);
    assert!(plan.removal.is_empty());
}

#[test]
fn test_chain_and_diamond_order() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/top"
version = "1"
dependencies = ["lib/left", "lib/right", "lib/base"]

[[repository.package]]
key = "lib/left"
version = "1"
dependencies = ["lib/base"]

[[repository.package]]
key = "lib/right"
version = "1"
dependencies = ["lib/base"]

[[repository.package]]
key = "lib/base"
version = "1"
dependencies = ["app/top"]
"#;
    let u = universe(doc);
    let plan = plan(&u, &["app/top"]).unwrap();
    let queued = atoms(&u, &plan.queue);
    assert_eq!(queued.len(), 4);
    assert_eq!(queued[0], "lib/base-1");
    assert_eq!(queued[3], "app/top-1");
}

#[test]
fn test_unresolved_atoms_from_every_root() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/x"
version = "1"
dependencies = ["lib/missing-one"]

[[repository.package]]
key = "app/y"
version = "1"
dependencies = [">=lib/missing-two-3"]
"#;
    let u = universe(doc);
    let err = plan(&u, &["app/x", "app/y"]).unwrap_err();
    let Error::Unresolved(list) = err else {
        panic!("expected unresolved, got {:?}", err);
    };
    let missing: HashSet<&str> = list.iter().map(|u| u.atom.as_str()).collect();
    assert_eq!(
        missing,
        HashSet::from(["lib/missing-one", ">=lib/missing-two-3"])
    );
    assert!(list.iter().all(|u| u.required_by.is_some()));
}

#[test]
fn test_masked_root_is_unresolved() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/hidden"
version = "1"
mask = "user_package_mask"
"#;
    let u = universe(doc);
    assert!(matches!(plan(&u, &["app/hidden"]), Err(Error::Unresolved(_))));
}

#[test]
fn test_conflict_without_replacement_is_removed() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/new"
version = "1"
dependencies = ["!app/old"]

[[installed]]
key = "app/old"
version = "1"
"#;
    let u = universe(doc);
    let plan = plan(&u, &["app/new"]).unwrap();
    assert_eq!(atoms(&u, &plan.queue), vec!["app/new-1"]);
    assert_eq!(plan.removal, vec![1]);
    assert!(matches!(
        plan.conflicts.as_slice(),
        [Conflict::Blocker { installed: 1, .. }]
    ));
}

#[test]
fn test_conflict_replaced_by_newer_package() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/new"
version = "1"
dependencies = ["!<app/old-2"]

[[repository.package]]
key = "app/old"
version = "2"

[[installed]]
key = "app/old"
version = "1"
"#;
    let u = universe(doc);
    let plan = plan(&u, &["app/new"]).unwrap();
    assert_eq!(atoms(&u, &plan.queue), vec!["app/old-2", "app/new-1"]);
    assert!(plan.removal.is_empty());
    assert!(plan.conflicts.is_empty());
}

#[test]
fn test_blocked_package_upgraded_in_same_request_is_replaced() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/new"
version = "1"
dependencies = ["!app/old"]

[[repository.package]]
key = "app/old"
version = "2"

[[installed]]
key = "app/old"
version = "1"
"#;
    let u = universe(doc);
    let plan = plan(&u, &["app/new", "app/old"]).unwrap();
    assert!(plan.removal.is_empty());
    assert_eq!(
        plan.conflicts,
        vec![Conflict::Replaced {
            installed: 1,
            key_slot: KeySlot::new("app/old", "0"),
        }]
    );
}

#[test]
fn test_queue_and_removal_are_disjoint() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/new"
version = "1"
dependencies = ["!app/old", "lib/dep"]

[[repository.package]]
key = "lib/dep"
version = "2"

[[installed]]
key = "app/old"
version = "1"

[[installed]]
key = "lib/dep"
version = "1"
dependencies = ["app/old"]
"#;
    let u = universe(doc);
    let config = ResolverConfig::default();
    let resolver = Resolver::new(&u.repositories, &u.installed, &config);
    let options = PlanOptions {
        deep: true,
        ..PlanOptions::default()
    };
    let plan = resolver.plan(&[Request::Spec(spec("app/new"))], &options).unwrap();

    let queued: HashSet<KeySlot> = plan
        .queue
        .iter()
        .map(|m| u.repositories.key_slot(m).unwrap())
        .collect();
    for id in &plan.removal {
        assert!(!queued.contains(&u.installed.key_slot(*id).unwrap()));
    }
    assert_eq!(plan.removal, vec![1]);
    assert_eq!(atoms(&u, &plan.queue), vec!["lib/dep-2", "app/new-1"]);
}

#[test]
fn test_inverse_dependencies_follow_upgrade() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "lib/core"
version = "2"

[[repository.package]]
key = "app/plugin"
version = "2"
dependencies = [">=lib/core-2"]

[[installed]]
key = "lib/core"
version = "1"

[[installed]]
key = "app/plugin"
version = "1"
dependencies = ["=lib/core-1"]
"#;
    let u = universe(doc);
    let plan = plan(&u, &["lib/core"]).unwrap();
    assert_eq!(atoms(&u, &plan.queue), vec!["lib/core-2", "app/plugin-2"]);
}

#[test]
fn test_library_breakage_pulls_rebuilds_and_suppliers() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/curl"
version = "2"
dependencies = ["lib/openssl"]
needed = ["libssl.so.3"]

[[repository.package]]
key = "app/wget"
version = "2"
needed = ["libssl.so.3"]

[[repository.package]]
key = "lib/openssl"
version = "3"
provides = ["libssl.so.3"]

[[installed]]
key = "app/curl"
version = "1"
needed = ["libssl.so.1"]

[[installed]]
key = "app/wget"
version = "1"
needed = ["libssl.so.1"]

[[installed]]
key = "lib/openssl"
version = "1"
provides = ["libssl.so.1"]
"#;
    let u = universe(doc);
    let plan = plan(&u, &["app/curl"]).unwrap();
    let queued = atoms(&u, &plan.queue);
    assert_eq!(queued.len(), 3);
    assert_eq!(queued[2], "app/curl-2");
    let pulled: HashSet<&str> = queued[..2].iter().map(String::as_str).collect();
    assert_eq!(pulled, HashSet::from(["app/wget-2", "lib/openssl-3"]));
}

#[test]
fn test_library_upgrade_rebuilds_consumers() {
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
needed = ["libssl.so.3"]

[[repository.package]]
key = "app/unrelated"
version = "2"

[[installed]]
key = "lib/openssl"
version = "1"
provides = ["libssl.so.1"]

[[installed]]
key = "app/curl"
version = "1"
needed = ["libssl.so.1"]

[[installed]]
key = "app/unrelated"
version = "1"
needed = ["libz.so.1"]
"#;
    let u = universe(doc);
    let plan = plan(&u, &["lib/openssl"]).unwrap();
    assert_eq!(atoms(&u, &plan.queue), vec!["lib/openssl-3", "app/curl-2"]);
}

#[test]
fn test_post_dependencies_follow_owner() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/editor"
version = "1"
dependencies = ["lib/text"]
post_dependencies = ["app/editor-plugins"]

[[repository.package]]
key = "lib/text"
version = "1"

[[repository.package]]
key = "app/editor-plugins"
version = "1"
"#;
    let u = universe(doc);
    let plan = plan(&u, &["app/editor"]).unwrap();
    assert_eq!(
        atoms(&u, &plan.queue),
        vec!["lib/text-1", "app/editor-1", "app/editor-plugins-1"]
    );
}

#[test]
fn test_installed_dependencies_skipped_unless_empty_deps() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/a"
version = "1"
dependencies = ["lib/x"]

[[repository.package]]
key = "lib/x"
version = "1"

[[installed]]
key = "lib/x"
version = "1"
"#;
    let u = universe(doc);
    let config = ResolverConfig::default();
    let resolver = Resolver::new(&u.repositories, &u.installed, &config);
    let request = [Request::Spec(spec("app/a"))];

    let plan = resolver.plan(&request, &PlanOptions::default()).unwrap();
    assert_eq!(atoms(&u, &plan.queue), vec!["app/a-1"]);

    let options = PlanOptions {
        empty_deps: true,
        ..PlanOptions::default()
    };
    let plan = resolver.plan(&request, &options).unwrap();
    assert_eq!(atoms(&u, &plan.queue), vec!["lib/x-1", "app/a-1"]);
}

#[test]
fn test_match_many_agrees_with_sequential_matching() {
    let u = universe(TWO_REPOS);
    let matcher = AtomMatcher::new(&u.repositories, &u.installed);
    let specs: Vec<_> = ["app/foo", "lib/bar", "lib/baz", "app/none", "lib/bar@main"]
        .iter()
        .map(|a| spec(a))
        .collect();

    let parallel = matcher.match_many(&specs, &MatchFilters::default());
    for (spec, result) in specs.iter().zip(parallel) {
        let sequential = matcher.match_atom(spec, &MatchFilters::default()).unwrap();
        assert_eq!(result.unwrap(), sequential);
    }
}

#[test]
fn test_injected_repository_beats_newer_version() {
    let doc = r#"
[[repository]]
id = "main"

[[repository.package]]
key = "app/foo"
version = "2.0"

[[repository]]
id = "local-file"
injected = true

[[repository.package]]
key = "app/foo"
version = "1.5"
"#;
    let u = universe(doc);
    let matcher = AtomMatcher::new(&u.repositories, &u.installed);
    let best = matcher
        .best_match(&spec("app/foo"), &MatchFilters::default())
        .unwrap();
    assert_eq!(best, Some(PackageMatch::new(1, "local-file")));

    let plan = plan(&u, &["app/foo"]).unwrap();
    assert_eq!(plan.queue, vec![PackageMatch::new(1, "local-file")]);

    // Restricting the atom to the main repository bypasses the injected one
    let best = matcher
        .best_match(&spec("app/foo@main"), &MatchFilters::default())
        .unwrap();
    assert_eq!(best, Some(PackageMatch::new(1, "main")));
}

#[test]
fn test_universe_loads_from_file() {
    let file = universe_file(TWO_REPOS);
    let u = Universe::load(file.path()).unwrap();
    assert_eq!(u.repositories.len(), 2);
    assert_eq!(
        find(&u, "extra", "lib/bar-2.5"),
        PackageMatch::new(2, "extra")
    );
}
