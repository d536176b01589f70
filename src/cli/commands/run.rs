//! Run command - Execute a playbook
//!
//! Parses the playbook, runs it through the executor with the assertive
//! callback attached and maps the outcome to an exit code:
//! `0` success, `2` a host failed, `4` the playbook could not be parsed,
//! `5` the report could not be written.

use super::CommandContext;
use anyhow::Result;
use assertive::callback::{AssertiveCallback, DefaultCallbackConfig};
use assertive::error::Error;
use assertive::executor::{Executor, ExecutorConfig, RunSummary};
use assertive::parser::Parser as PlaybookParser;
use assertive::traits::EventSink;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the playbook file
    #[arg(required = true)]
    pub playbook: PathBuf,

    /// Write the assertion report to this file
    #[arg(long, value_name = "PATH")]
    pub record: Option<PathBuf>,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let start_time = Instant::now();

        let playbook = match PlaybookParser::new().parse_playbook(&self.playbook) {
            Ok(playbook) => playbook,
            Err(e) => {
                let err = Error::playbook_parse(&self.playbook, e.to_string(), Some(Box::new(e)));
                eprintln!("ERROR! {}", err);
                return Ok(err.exit_code());
            }
        };
        let extra_vars = ctx.parse_extra_vars()?;

        let record = self
            .record
            .clone()
            .or_else(|| ctx.config.assertive.record.clone());

        let callback = Arc::new(
            AssertiveCallback::new()
                .with_default_config(DefaultCallbackConfig {
                    verbosity: ctx.verbosity,
                    no_color: ctx.no_color,
                    ..DefaultCallbackConfig::default()
                })
                .with_record(record),
        );
        let sink: Arc<dyn EventSink> = callback.clone();

        let config = ExecutorConfig {
            forks: ctx.forks,
            check_mode: ctx.check_mode,
            verbosity: ctx.verbosity,
            extra_vars,
        };
        let executor =
            Executor::new(config, sink).with_fail_verbose(ctx.config.assertive.fail_verbose);

        let summary = executor.run(&playbook).await;
        print_invocations(&summary);

        info!(
            playbook = %self.playbook.display(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            success = summary.success(),
            "Run complete"
        );

        if let Some(err) = callback.take_write_error() {
            warn!(error = %err, "Report was not written");
            eprintln!("ERROR! {}", err);
            return Ok(err.exit_code());
        }

        Ok(summary.exit_code())
    }
}

/// Per-invocation counters from the tasks' side channel.
fn print_invocations(summary: &RunSummary) {
    let invocations = summary.invocations;
    if invocations.assertions == 0 {
        return;
    }
    println!(
        "INVOCATIONS: assertions={} passed={} failed={}",
        invocations.assertions, invocations.assertions_passed, invocations.assertions_failed
    );
}
