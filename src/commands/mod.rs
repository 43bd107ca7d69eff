// src/commands/mod.rs
//! Command handlers for the pkgsolve CLI

mod install;
mod query;
mod remove;
mod update;

pub use install::cmd_install;
pub use query::{cmd_check, cmd_match};
pub use remove::cmd_remove;
pub use update::{cmd_updates, cmd_world};

use anyhow::{Context, Result};
use pkgsolve::{
    InstalledStore, MatchCache, MatchResult, PackageMatch, Resolver, ResolverConfig, Universe,
};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Everything a command resolves against
pub struct Session {
    pub universe: Universe,
    pub config: ResolverConfig,
    cache: Option<MatchCache<MatchResult>>,
}

impl Session {
    pub fn open(universe_path: &str, config_path: Option<&str>) -> Result<Self> {
        let universe = Universe::load(Path::new(universe_path))
            .with_context(|| format!("Failed to load universe from {}", universe_path))?;

        let config = match config_path {
            Some(path) => ResolverConfig::load(Path::new(path))
                .with_context(|| format!("Failed to load configuration from {}", path))?,
            None => ResolverConfig::default(),
        };

        let cache = config
            .cache
            .enabled
            .then(|| MatchCache::new(config.cache.max_entries));
        debug!("Match cache enabled: {}", cache.is_some());

        Ok(Self {
            universe,
            config,
            cache,
        })
    }

    pub fn resolver(&self) -> Resolver<'_> {
        let resolver = Resolver::new(
            &self.universe.repositories,
            &self.universe.installed,
            &self.config,
        );
        match &self.cache {
            Some(cache) => resolver.with_cache(cache),
            None => resolver,
        }
    }

    /// Display atom of a repository package, falling back to its id
    pub fn describe(&self, m: &PackageMatch) -> String {
        match self.universe.repositories.atom(m) {
            Ok(atom) => format!("{} [{}]", atom, m.repository),
            Err(_) => m.to_string(),
        }
    }

    pub fn describe_installed(&self, id: i64) -> String {
        self.universe
            .installed
            .atom(id)
            .unwrap_or_else(|_| format!("installed #{}", id))
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
