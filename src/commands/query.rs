// src/commands/query.rs

//! Atom matching and installed-set checks

use super::{print_json, Session};
use anyhow::{Context, Result};
use pkgsolve::resolver::MatchResult;
use pkgsolve::{MatchFilters, Specifier, WorldUpdateCalculator};

/// Match an atom and print the result
pub fn cmd_match(
    session: &Session,
    atom: &str,
    multi: bool,
    multi_repo: bool,
    no_mask: bool,
    slot: Option<&str>,
    format: &str,
) -> Result<()> {
    let spec = Specifier::parse(atom).with_context(|| format!("Invalid atom '{}'", atom))?;

    let mut filters = MatchFilters::default();
    if multi {
        filters = filters.all_matches(multi_repo);
    }
    if no_mask {
        filters = filters.without_masking();
    }
    if let Some(slot) = slot {
        filters = filters.with_slot(slot);
    }

    let resolver = session.resolver();
    let result = resolver.matcher().match_atom(&spec, &filters)?;

    if format == "json" {
        return print_json(&result);
    }

    match &result {
        MatchResult::Found(matches) => {
            for (i, m) in matches.iter().enumerate() {
                let action = resolver.matcher().package_action(m)?;
                let marker = if i == 0 { "*" } else { " " };
                println!("{} {} ({:?})", marker, session.describe(m), action);
            }
        }
        MatchResult::NotFound => {
            println!("No package matches '{}'", spec);
        }
        MatchResult::Masked(candidates) => {
            println!("All candidates for '{}' are masked:", spec);
            for (m, reason) in candidates {
                println!("  {} - {}", session.describe(m), reason);
            }
        }
    }

    Ok(())
}

/// List installed dependencies that nothing installed satisfies
pub fn cmd_check(session: &Session, format: &str) -> Result<()> {
    let resolver = session.resolver();
    let calculator =
        WorldUpdateCalculator::new(resolver.matcher(), session.config.synced_revision);
    let broken = calculator.dependencies_test()?;

    if format == "json" {
        return print_json(&broken);
    }

    if broken.is_empty() {
        println!("All installed dependencies are satisfied.");
        return Ok(());
    }

    println!("Broken dependencies ({}):", broken.len());
    for dep in &broken {
        println!(
            "  {} needs {}",
            session.describe_installed(dep.installed),
            dep.atom
        );
    }

    Ok(())
}
