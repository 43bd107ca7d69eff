// src/cli.rs
//! CLI definitions for pkgsolve
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pkgsolve")]
#[command(version)]
#[command(about = "Resolve package atoms, install queues and removals", long_about = None)]
pub struct Cli {
    /// Universe file: repositories in priority order plus the installed set
    #[arg(short, long, global = true, default_value = "universe.toml")]
    pub universe: String,

    /// Resolver configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format: text or json
    #[arg(long, global = true, default_value = "text")]
    pub format: String,

    /// Log resolver decisions (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match an atom against the repositories
    Match {
        /// Atom, e.g. ">=app-misc/foo-1.2:0"
        atom: String,

        /// Return every matching package of the winning repository
        #[arg(long)]
        multi: bool,

        /// With --multi, collect matches from every repository
        #[arg(long)]
        multi_repo: bool,

        /// Ignore masking policy
        #[arg(long)]
        no_mask: bool,

        /// Restrict to a slot
        #[arg(long)]
        slot: Option<String>,
    },

    /// Plan the install queue for one or more atoms
    Install {
        /// Atoms to install
        #[arg(required = true)]
        atoms: Vec<String>,

        /// Re-check installed dependencies against the repositories
        #[arg(long)]
        deep: bool,

        /// Queue every dependency whether installed or not
        #[arg(long)]
        empty_deps: bool,

        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Plan the removal of installed packages
    Remove {
        /// Atoms matching installed packages
        #[arg(required = true)]
        atoms: Vec<String>,

        /// Also remove dependencies nothing else needs
        #[arg(long)]
        deep: bool,
    },

    /// Show which installed packages are outdated or gone
    Updates {
        /// Only consider repository entries at or below this branch
        #[arg(long)]
        branch: Option<String>,
    },

    /// Plan a full system update
    World {
        /// Only consider repository entries at or below this branch
        #[arg(long)]
        branch: Option<String>,

        /// Re-check installed dependencies against the repositories
        #[arg(long)]
        deep: bool,
    },

    /// List installed dependencies nothing installed satisfies
    Check,
}
