//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_DOCUMENT_FILE;
use crate::state::DEFAULT_STATE_DIR;

/// pingone-provider - Declarative PingOne configuration manager.
#[derive(Parser, Debug)]
#[command(name = "pingone-provider")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the deployment document.
    #[arg(short, long, global = true, env = "PINGONE_DEPLOY_FILE", default_value = DEFAULT_DOCUMENT_FILE)]
    pub file: PathBuf,

    /// Directory holding the state file and its lock.
    #[arg(long, global = true, env = "PINGONE_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log line format.
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the deployment document.
    Validate,

    /// Generate and display the deployment plan.
    Plan,

    /// Apply the deployment plan.
    Apply {
        /// Skip confirmation prompt.
        #[arg(long)]
        auto_approve: bool,

        /// Continue on errors.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Update state from the platform.
    Refresh,

    /// Check for drift between state and the platform.
    Drift,

    /// Bring an existing object under management.
    Import {
        /// Resource address, e.g. `pingone_risk_predictor.main`.
        address: String,

        /// Import ID, e.g. `<environment_id>/<risk_predictor_id>`.
        id: String,
    },

    /// Destroy every managed resource.
    Destroy {
        /// Skip confirmation prompt.
        #[arg(long)]
        auto_approve: bool,
    },

    /// Inspect and edit state.
    State {
        /// State subcommand.
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Print resource and data source schemas.
    Schema {
        /// Type to describe (lists every type when omitted).
        type_name: Option<String>,
    },
}

/// State management subcommands.
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// List managed addresses.
    List,

    /// Show the stored attributes of one resource.
    Show {
        /// Resource address.
        address: String,
    },

    /// Stop managing a resource without deleting it.
    Rm {
        /// Resource address.
        address: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
    /// YAML output.
    Yaml,
}

/// Log line format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
