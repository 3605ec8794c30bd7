//! CLI module for the PingOne deployment tool.
//!
//! This module provides the command-line interface for planning and
//! applying PingOne configuration.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat, StateCommands};
pub use output::OutputFormatter;
