//! CLI command definitions for layered-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::config::DEFAULT_ENV_PREFIX;
use crate::format::OutputFormat;
use clap::{Parser, Subcommand};

/// Inspect a layered configuration directory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration directory (default: <PREFIX>CONFIG_DIR)
    #[arg(short, long, global = true)]
    pub config_dir: Option<String>,

    /// Environment name (overrides <PREFIX>ENV)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Environment variable prefix
    #[arg(short, long, default_value = DEFAULT_ENV_PREFIX, global = true)]
    pub prefix: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the merged tree, or the subtree at a key
    Show {
        /// Dotted key of the subtree to print
        #[arg(long, value_name = "KEY")]
        path: Option<String>,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Print the value at a dotted key
    Get {
        #[arg(value_name = "KEY")]
        key: String,

        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Print the config directory, environment and sources in merge order
    Sources,

    /// Print every leaf key
    Keys,

    /// Print the tree and reprint it whenever a source file changes
    Watch {
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}
