//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Simulate command arguments.
#[derive(Debug, Args)]
pub struct SimulateCommand {
    /// Seconds between publisher ticks (overrides configuration)
    #[arg(short, long, value_name = "SECS")]
    pub interval_secs: Option<u64>,

    /// Run the publisher only, without a live tracker
    #[arg(long)]
    pub no_tracker: bool,

    /// Print every record written to the store as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Route command arguments.
#[derive(Debug, Args)]
pub struct RouteCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_command_debug() {
        let cmd = SimulateCommand {
            interval_secs: Some(2),
            no_tracker: true,
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("interval_secs"));
        assert!(debug_str.contains("no_tracker"));
    }

    #[test]
    fn test_config_command_variants() {
        let show = ConfigCommand::Show { json: true };
        assert!(matches!(show, ConfigCommand::Show { json: true }));

        let validate = ConfigCommand::Validate {
            file: Some(PathBuf::from("/tmp/config.toml")),
        };
        assert!(matches!(validate, ConfigCommand::Validate { file: Some(_) }));
    }
}
