// src/commands/update.rs

//! World update commands

use super::install::print_plan;
use super::{print_json, Session};
use anyhow::Result;
use pkgsolve::{InstalledStore, PlanOptions, WorldUpdateCalculator};

/// Show outdated and vanished installs
pub fn cmd_updates(session: &Session, branch: Option<&str>, format: &str) -> Result<()> {
    let resolver = session.resolver();
    let calculator =
        WorldUpdateCalculator::new(resolver.matcher(), session.config.synced_revision);
    let diff = calculator.diff(
        &session.universe.installed.installed_ids(),
        branch,
        session.config.ignore_synced_revision,
    )?;

    if format == "json" {
        return print_json(&diff);
    }

    println!("Up to date: {}", diff.fine.len());

    if !diff.update.is_empty() {
        println!("Updates ({}):", diff.update.len());
        for m in &diff.update {
            println!("  {}", session.describe(m));
        }
    }

    if !diff.remove.is_empty() {
        println!("Not available from any repository ({}):", diff.remove.len());
        for id in &diff.remove {
            println!("  {}", session.describe_installed(*id));
        }
    }

    Ok(())
}

/// Plan a full system update
pub fn cmd_world(session: &Session, branch: Option<&str>, deep: bool, format: &str) -> Result<()> {
    let options = PlanOptions {
        deep,
        ..PlanOptions::default()
    };
    let world = session.resolver().world_queue(branch, &options)?;

    if format == "json" {
        return print_json(&world);
    }

    print_plan(session, &world.plan);

    if !world.obsolete.is_empty() {
        println!("Obsolete ({}):", world.obsolete.len());
        for id in &world.obsolete {
            println!("  {}", session.describe_installed(*id));
        }
    }

    Ok(())
}
