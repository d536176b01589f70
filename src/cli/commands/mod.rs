//! Subcommands module for Assertive CLI
//!
//! This module contains all the subcommand implementations.

pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use assertive::config::Config;
use assertive::parser::Parser;
use assertive::traits::Variables;

/// Common context shared between commands
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Configuration, environment overrides applied
    pub config: Config,
    /// Extra variables as given on the command line
    pub extra_vars: Vec<String>,
    /// Verbosity level
    pub verbosity: u8,
    /// Check mode
    pub check_mode: bool,
    /// Number of parallel forks
    pub forks: usize,
    /// Disable colored output
    pub no_color: bool,
}

impl CommandContext {
    /// Create a new command context; CLI flags win over the configuration.
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        Self {
            forks: cli.forks.unwrap_or(config.defaults.forks),
            no_color: cli.no_color || config.colors.no_color,
            extra_vars: cli.extra_vars.clone(),
            verbosity: cli.verbosity(),
            check_mode: cli.check_mode,
            config,
        }
    }

    /// Parse `-e` arguments; relative `@file` paths resolve against the
    /// working directory.
    pub fn parse_extra_vars(&self) -> Result<Variables> {
        Parser::new()
            .parse_extra_vars(&self.extra_vars)
            .context("Failed to parse extra variables")
    }
}
