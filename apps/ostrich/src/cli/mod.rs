//! # OSTRICH CLI Module
//!
//! This module implements the command-line interface.
//!
//! ## Available Commands
//!
//! - `vm` - Query one version of an archive
//! - `dm` - Query the changes between two versions
//! - `v` - Query every version a triple exists in
//! - `metadata` - Show archive statistics
//! - `append` - Append a patch file as the next version
//! - `ingest` - Import a directory of version sub-directories

mod commands;

use crate::config::AppConfig;
use clap::{Args, Parser, Subcommand};
use ostrich_core::{StoreError, StoreOptions, Version};
use std::io::Write;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// OSTRICH - versioned triple archives
///
/// Patterns are three whitespace-separated terms. A term starting with `?`
/// is a variable; angle brackets around IRIs are optional.
#[derive(Parser, Debug)]
#[command(name = "ostrich")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// TOML configuration file with a [store] table
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Patch-tree entries fetched per storage page
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    /// Matches counted before the total falls back to an estimate
    #[arg(long, global = true)]
    pub exact_count_limit: Option<usize>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Result window shared by the query commands.
#[derive(Args, Debug, Clone, Copy)]
pub struct Page {
    /// Number of results to skip
    #[arg(short, long, default_value_t = 0)]
    pub offset: usize,

    /// Number of results to show (0 = all)
    #[arg(short, long, default_value_t = 0)]
    pub limit: usize,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Query version materialized
    Vm {
        /// Path to an OSTRICH archive
        archive: PathBuf,

        /// A triple pattern, e.g. '?s <http://ex.org/p> ?o'
        pattern: String,

        /// The version to query (default: latest)
        #[arg(short, long)]
        version: Option<Version>,

        #[command(flatten)]
        page: Page,
    },

    /// Query delta materialized
    Dm {
        /// Path to an OSTRICH archive
        archive: PathBuf,

        /// A triple pattern
        pattern: String,

        /// The starting version
        #[arg(short, long, default_value_t = 0)]
        start: Version,

        /// The ending version (default: latest)
        #[arg(short, long)]
        end: Option<Version>,

        #[command(flatten)]
        page: Page,
    },

    /// Query the versions of each matching triple
    V {
        /// Path to an OSTRICH archive
        archive: PathBuf,

        /// A triple pattern
        pattern: String,

        #[command(flatten)]
        page: Page,
    },

    /// Show the metadata of an archive
    Metadata {
        /// Path to an OSTRICH archive
        archive: PathBuf,
    },

    /// Append a patch file of '+'/'-' prefixed N-Triples lines
    Append {
        /// Path to an OSTRICH archive (created if missing)
        archive: PathBuf,

        /// The patch file
        #[arg(short, long)]
        file: PathBuf,

        /// Version to commit (default: next)
        #[arg(short = 'V', long = "as-version")]
        version: Option<Version>,
    },

    /// Import numbered version directories
    Ingest {
        /// Path to an OSTRICH archive (created if missing)
        archive: PathBuf,

        /// Directory holding one sub-directory per version
        dir: PathBuf,
    },
}

impl Cli {
    /// Store options from the config file with command-line overrides applied.
    pub fn store_options(&self) -> Result<StoreOptions, StoreError> {
        let mut options = AppConfig::load(self.config.as_deref())?.store;
        if let Some(page_size) = self.page_size {
            options.page_size = page_size;
        }
        if let Some(limit) = self.exact_count_limit {
            options.exact_count_limit = limit;
        }
        options.validate()?;
        Ok(options)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments, writing results to `out`.
pub async fn execute<W: Write>(cli: Cli, out: &mut W) -> Result<(), StoreError> {
    let options = cli.store_options()?;
    let json_mode = cli.json;

    match cli.command {
        Commands::Vm {
            archive,
            pattern,
            version,
            page,
        } => cmd_vm(&archive, options, json_mode, &pattern, version, page, out).await,
        Commands::Dm {
            archive,
            pattern,
            start,
            end,
            page,
        } => cmd_dm(&archive, options, json_mode, &pattern, start, end, page, out).await,
        Commands::V {
            archive,
            pattern,
            page,
        } => cmd_v(&archive, options, json_mode, &pattern, page, out).await,
        Commands::Metadata { archive } => cmd_metadata(&archive, options, json_mode, out).await,
        Commands::Append {
            archive,
            file,
            version,
        } => cmd_append(&archive, options, json_mode, &file, version, out).await,
        Commands::Ingest { archive, dir } => {
            cmd_ingest(&archive, options, json_mode, &dir, out).await
        }
    }
}
