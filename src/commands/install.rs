// src/commands/install.rs

//! Install queue planning

use super::{print_json, Session};
use anyhow::{Context, Result};
use pkgsolve::{Error, InstallPlan, PlanOptions, Request, Specifier};
use std::time::{Duration, Instant};
use tracing::info;

/// Plan the install of `atoms` and print the queue
pub fn cmd_install(
    session: &Session,
    atoms: &[String],
    deep: bool,
    empty_deps: bool,
    timeout_ms: Option<u64>,
    format: &str,
) -> Result<()> {
    let requests = atoms
        .iter()
        .map(|atom| {
            Specifier::parse(atom)
                .map(Request::Spec)
                .with_context(|| format!("Invalid atom '{}'", atom))
        })
        .collect::<Result<Vec<_>>>()?;

    let options = PlanOptions {
        empty_deps,
        deep,
        deadline: timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms)),
    };

    info!("Planning install of {} atoms", requests.len());
    let plan = match session.resolver().plan(&requests, &options) {
        Ok(plan) => plan,
        Err(Error::Unresolved(missing)) if format != "json" => {
            println!("Cannot satisfy the request; unresolved dependencies:");
            for dep in &missing {
                println!("  {}", dep);
            }
            return Err(anyhow::anyhow!("{} unresolved dependencies", missing.len()));
        }
        Err(e) => return Err(e.into()),
    };

    if format == "json" {
        return print_json(&plan);
    }

    print_plan(session, &plan);
    Ok(())
}

pub(super) fn print_plan(session: &Session, plan: &InstallPlan) {
    if plan.is_empty() {
        println!("Nothing to do.");
        return;
    }

    if !plan.queue.is_empty() {
        println!("Install queue ({}):", plan.queue.len());
        for (i, m) in plan.queue.iter().enumerate() {
            println!("  {:>3}. {}", i + 1, session.describe(m));
        }
    }

    if !plan.removal.is_empty() {
        println!("Remove ({}):", plan.removal.len());
        for id in &plan.removal {
            println!("  {}", session.describe_installed(*id));
        }
    }

    for conflict in &plan.conflicts {
        println!("Note: {}", conflict);
    }
}
