//! CLI module for Assertive
//!
//! This module provides the command-line interface, including argument
//! parsing and subcommand handling.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Assertive - run playbook assertions and report every outcome
#[derive(Parser, Debug, Clone)]
#[command(name = "assertive")]
#[command(version)]
#[command(about = "Run playbook assertions and record the results", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Extra variables (key=value, inline YAML/JSON, or @file.yml)
    #[arg(short = 'e', long = "extra-vars", global = true, action = clap::ArgAction::Append)]
    pub extra_vars: Vec<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run in check mode
    #[arg(long = "check", global = true)]
    pub check_mode: bool,

    /// Number of hosts running a task at once
    #[arg(short = 'f', long, global = true)]
    pub forks: Option<usize>,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a playbook
    Run(commands::run::RunArgs),

    /// Validate playbook syntax
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-4)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["assertive", "run", "playbook.yml"]).unwrap();
        assert!(matches!(cli.command, Commands::Run(_)));
        assert!(cli.forks.is_none());
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["assertive", "-vvvvvv", "run", "playbook.yml"]).unwrap();
        assert_eq!(cli.verbosity(), 4);
    }

    #[test]
    fn test_extra_vars_and_record() {
        let cli = Cli::try_parse_from([
            "assertive",
            "-e",
            "key1=value1",
            "run",
            "playbook.yml",
            "-e",
            "key2=value2",
            "--record",
            "out.yml",
        ])
        .unwrap();
        assert_eq!(cli.extra_vars.len(), 2);
        match cli.command {
            Commands::Run(args) => assert_eq!(args.record, Some(PathBuf::from("out.yml"))),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::try_parse_from(["assertive", "validate", "site.yml"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate(_)));
    }
}
