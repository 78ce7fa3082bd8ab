//! Command-line interface for bustrack.
//!
//! This module provides the CLI structure and the terminal sinks used by the
//! `bustrack` binary.

mod commands;
mod console;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, RouteCommand, SimulateCommand};
pub use console::{ConsoleMap, ConsoleStatus};

use crate::logging::Verbosity;

/// bustrack - Live vehicle position tracking
///
/// Simulates a vehicle driving a fixed route, publishing its position to a
/// shared store, and follows it with a live tracker that animates a marker
/// between updates.
#[derive(Debug, Parser)]
#[command(name = "bustrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the publisher over the configured route and track it live
    Simulate(SimulateCommand),

    /// Show the configured route
    Route(RouteCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
