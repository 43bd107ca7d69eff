// src/config.rs

//! Resolver configuration
//!
//! Read from a TOML file:
//!
//! ```toml
//! forced = ["sys-apps/baselayout"]
//! synced_revision = 9999
//! ignore_synced_downgrades = true
//!
//! [cache]
//! enabled = true
//! max_entries = 4096
//! ```
//!
//! Every field is optional.

use crate::atom::Specifier;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Revision carried by installs that were synced from outside the repositories
pub const DEFAULT_SYNCED_REVISION: u32 = 9999;

/// Default capacity of the match cache
pub const DEFAULT_CACHE_ENTRIES: usize = 4096;

fn default_synced_revision() -> u32 {
    DEFAULT_SYNCED_REVISION
}

fn default_true() -> bool {
    true
}

fn default_cache_entries() -> usize {
    DEFAULT_CACHE_ENTRIES
}

/// Settings shared by every resolution call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Packages the repositories require on every system
    #[serde(default)]
    pub forced: Vec<String>,

    #[serde(default = "default_synced_revision")]
    pub synced_revision: u32,

    /// Treat a revision-only difference against a synced install as up to date
    #[serde(default = "default_true")]
    pub ignore_synced_revision: bool,

    /// A repository entry older than a synced install does not need pulling
    #[serde(default = "default_true")]
    pub ignore_synced_downgrades: bool,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Match cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_CACHE_ENTRIES,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            forced: Vec::new(),
            synced_revision: DEFAULT_SYNCED_REVISION,
            ignore_synced_revision: true,
            ignore_synced_downgrades: true,
            cache: CacheConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: ResolverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for atom in &self.forced {
            let spec = Specifier::parse(atom)?;
            if spec.negated {
                return Err(Error::Config(format!(
                    "forced package '{}' cannot be a conflict",
                    atom
                )));
            }
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(Error::Config(
                "cache.max_entries must be positive when the cache is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed forced specifiers; entries that fail to parse are skipped
    pub fn forced_specifiers(&self) -> Vec<Specifier> {
        self.forced
            .iter()
            .filter_map(|atom| match Specifier::parse(atom) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    warn!("Ignoring forced package: {}", e);
                    None
                }
            })
            .collect()
    }
}
