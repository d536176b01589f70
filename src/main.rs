//! Assertive - run playbook assertions and record the results
//!
//! This is the main entry point for the Assertive CLI.

mod cli;

use anyhow::Result;
use assertive::config::Config;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if cli.verbosity() >= 2 {
        eprintln!("Assertive v{}", VERSION);
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR! {:#}", e);
            std::process::exit(1);
        }
    };

    let ctx = CommandContext::new(&cli, config);

    let exit_code = match &cli.command {
        Commands::Run(args) => args.execute(&ctx).await,
        Commands::Validate(args) => args.execute().await,
    }
    .unwrap_or_else(|e| {
        eprintln!("ERROR! {:#}", e);
        1
    });

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}
