//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

/// Reversible system tweaks, staged and committed in batches
#[derive(Debug, Parser)]
#[command(name = "tweakctl")]
#[command(about = "Browse, apply and revert reversible system tweaks", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Path to daemon socket (overrides $TWEAKD_SOCKET and config)
    #[arg(long, global = true)]
    pub socket: Option<String>,

    /// Config file (overrides $TWEAKCTL_CONFIG and the default locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List tweaks with their current state
    List {
        /// Only tweaks in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// List categories (catalog only, no status query)
    Categories,

    /// Show one tweak in detail
    Show { id: String },

    /// Apply one option of a tweak immediately
    Apply { id: String, option: usize },

    /// Restore a tweak from its backup
    Revert { id: String },

    /// Stage several changes and commit them in one batch
    Commit {
        /// Changes as <id>=<option>
        #[arg(required = true)]
        changes: Vec<ChangeArg>,
    },

    /// Revert several tweaks in one batch
    RevertAll {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show daemon host information
    Info,
}

/// One `<id>=<option>` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeArg {
    pub tweak_id: String,
    pub option_index: usize,
}

impl FromStr for ChangeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, option) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <id>=<option>, got '{}'", s))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(format!("missing tweak id in '{}'", s));
        }
        let option_index = option
            .trim()
            .parse()
            .map_err(|_| format!("option must be a number in '{}'", s))?;
        Ok(Self {
            tweak_id: id.to_string(),
            option_index,
        })
    }
}
