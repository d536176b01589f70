//! Validate command - Check playbook syntax without running it

use anyhow::Result;
use assertive::error::Error;
use assertive::parser::Parser as PlaybookParser;
use clap::Parser;
use std::path::PathBuf;

/// Arguments for validate command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Playbook file to validate
    pub playbook: PathBuf,
}

impl ValidateArgs {
    /// Parse the playbook and report what it contains.
    pub async fn execute(&self) -> Result<i32> {
        match PlaybookParser::new().parse_playbook(&self.playbook) {
            Ok(playbook) => {
                println!(
                    "Playbook '{}' is valid: {} play(s), {} task(s)",
                    self.playbook.display(),
                    playbook.plays.len(),
                    playbook.task_count()
                );
                Ok(0)
            }
            Err(e) => {
                let err = Error::playbook_parse(&self.playbook, e.to_string(), Some(Box::new(e)));
                eprintln!("ERROR! {}", err);
                Ok(err.exit_code())
            }
        }
    }
}
