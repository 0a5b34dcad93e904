//! CLI module for forma
//!
//! Provides command-line interface parsing and handling for the `forma` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// forma - run agent workflow plans
///
/// Validates and executes plans whose steps are delegated to agents
/// configured in forma.toml.
#[derive(Parser, Debug)]
#[command(
    name = "forma",
    version,
    about = "forma - agent workflow orchestrator",
    after_help = "EXAMPLES:\n    \
                  forma validate plans/launch.toml     # Check a plan and show its dispatch waves\n    \
                  forma run plans/launch.toml          # Execute a plan\n    \
                  forma run plan.json --json           # Print the workflow result as JSON\n    \
                  forma agents --config studio.toml    # List agents from a custom config"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "forma.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a plan's structure without running it
    Validate {
        /// Plan file (.toml or .json)
        plan: PathBuf,
    },

    /// Execute a plan
    Run {
        /// Plan file (.toml or .json)
        plan: PathBuf,

        /// User id passed to every agent
        #[arg(long, default_value = "cli")]
        user: String,

        /// Session id passed to every agent (random when omitted)
        #[arg(long)]
        session: Option<String>,

        /// Print the workflow result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured agents
    Agents,

    /// Show configuration information
    Config {
        /// Only validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "forma", "run", "plan.toml", "--user", "ada", "--json", "--no-color",
        ])
        .unwrap();

        assert!(cli.no_color);
        assert_eq!(cli.config, PathBuf::from("forma.toml"));
        match cli.command {
            Commands::Run {
                plan,
                user,
                session,
                json,
            } => {
                assert_eq!(plan, PathBuf::from("plan.toml"));
                assert_eq!(user, "ada");
                assert!(session.is_none());
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["forma", "agents", "--config", "studio.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("studio.toml"));
        assert!(matches!(cli.command, Commands::Agents));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["forma"]).is_err());
    }
}
