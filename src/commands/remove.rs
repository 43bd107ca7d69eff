// src/commands/remove.rs

//! Removal planning

use super::{print_json, Session};
use anyhow::{Context, Result};
use pkgsolve::{InstalledStore, RemovalClosureBuilder, Specifier};
use tracing::warn;

/// Plan the removal of the installed packages matching `atoms`
pub fn cmd_remove(session: &Session, atoms: &[String], deep: bool, format: &str) -> Result<()> {
    let installed = &session.universe.installed;
    let builder = RemovalClosureBuilder::new(installed);

    let mut seed = Vec::new();
    for atom in atoms {
        let spec = Specifier::parse(atom).with_context(|| format!("Invalid atom '{}'", atom))?;
        let matches = installed.match_all(&spec);
        if matches.is_empty() {
            return Err(anyhow::anyhow!("No installed package matches '{}'", atom));
        }
        for id in matches {
            if !builder.validate_removal(id)? {
                return Err(anyhow::anyhow!(
                    "{} is required by the system and cannot be removed",
                    session.describe_installed(id)
                ));
            }
            if !seed.contains(&id) {
                seed.push(id);
            }
        }
    }

    let order = builder.closure(&seed, deep)?;
    if order.len() > seed.len() {
        warn!(
            "Removing {} also removes {} other packages",
            atoms.join(" "),
            order.len() - seed.len()
        );
    }

    if format == "json" {
        return print_json(&order);
    }

    println!("Removal order ({}):", order.len());
    for (i, id) in order.iter().enumerate() {
        let marker = if seed.contains(id) { "" } else { " (dependant)" };
        println!("  {:>3}. {}{}", i + 1, session.describe_installed(*id), marker);
    }

    Ok(())
}
