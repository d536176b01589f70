//! YAML parsing for playbooks and variable files.
//!
//! This module provides:
//! - Playbook YAML parsing
//! - Variable file parsing
//! - Extra-vars parsing (`key=value`, inline YAML/JSON, or `@file`)

pub mod playbook;

pub use playbook::{LoopSpec, Play, Playbook, Task, BUILTIN_PREFIX, KNOWN_ACTIONS};

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::traits::Variables;

/// Errors that can occur during parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid playbook structure: {0}")]
    InvalidStructure(String),

    #[error("invalid extra vars '{input}': {message}")]
    ExtraVars { input: String, message: String },
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Playbook and variable parser
#[derive(Debug, Default)]
pub struct Parser {
    /// Base directory for relative `@file` references
    base_dir: Option<PathBuf>,
}

impl Parser {
    /// Create a new parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with a base directory
    pub fn with_base_dir<P: AsRef<Path>>(mut self, base_dir: P) -> Self {
        self.base_dir = Some(base_dir.as_ref().to_path_buf());
        self
    }

    /// Parse a playbook from a file
    pub fn parse_playbook<P: AsRef<Path>>(&self, path: P) -> ParseResult<Playbook> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let mut playbook = self.parse_playbook_str(&content)?;
        playbook.source_path = Some(path.to_path_buf());

        Ok(playbook)
    }

    /// Parse a playbook from a string.
    ///
    /// The document is either a list of plays or a single play mapping.
    pub fn parse_playbook_str(&self, content: &str) -> ParseResult<Playbook> {
        let doc: serde_yaml::Value = serde_yaml::from_str(content)?;

        let plays: Vec<Play> = match doc {
            serde_yaml::Value::Sequence(_) => serde_yaml::from_value(doc)?,
            serde_yaml::Value::Mapping(_) => vec![serde_yaml::from_value(doc)?],
            serde_yaml::Value::Null => Vec::new(),
            _ => {
                return Err(ParseError::InvalidStructure(
                    "a playbook must be a list of plays".to_string(),
                ))
            }
        };

        let mut playbook = Playbook::new();
        for play in plays {
            for key in play.extra.keys() {
                tracing::warn!(play = %play.display_name(), key = %key, "Ignoring unsupported play keyword");
            }
            playbook.add_play(play);
        }

        Self::validate(&playbook)?;
        Ok(playbook)
    }

    /// Check structural rules serde cannot express.
    pub fn validate(playbook: &Playbook) -> ParseResult<()> {
        for (index, play) in playbook.plays.iter().enumerate() {
            if play.hosts.is_empty() {
                return Err(ParseError::InvalidStructure(format!(
                    "play {} ('{}') targets no hosts",
                    index + 1,
                    play.display_name()
                )));
            }
            for task in &play.tasks {
                if task.module_name() == "assert" && !task.args.contains_key("that") {
                    return Err(ParseError::InvalidStructure(format!(
                        "assert task '{}' in play '{}' has no 'that'",
                        task.display_name(),
                        play.display_name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Parse a variables file
    pub fn parse_vars<P: AsRef<Path>>(&self, path: P) -> ParseResult<Variables> {
        let content = std::fs::read_to_string(path)?;
        self.parse_vars_str(&content)
    }

    /// Parse variables from a YAML or JSON mapping
    pub fn parse_vars_str(&self, content: &str) -> ParseResult<Variables> {
        let vars: Option<Variables> = serde_yaml::from_str(content)?;
        Ok(vars.unwrap_or_default())
    }

    /// Parse `-e` arguments, later arguments overriding earlier ones.
    pub fn parse_extra_vars(&self, inputs: &[String]) -> ParseResult<Variables> {
        let mut vars = Variables::new();
        for input in inputs {
            let parsed = if let Some(file) = input.strip_prefix('@') {
                self.parse_vars(self.resolve(file))?
            } else if input.trim_start().starts_with('{') {
                self.parse_vars_str(input).map_err(|e| ParseError::ExtraVars {
                    input: input.clone(),
                    message: e.to_string(),
                })?
            } else {
                playbook::parse_free_form(input)
                    .map_err(|message| ParseError::ExtraVars {
                        input: input.clone(),
                        message,
                    })?
                    .into_iter()
                    .collect()
            };
            vars.extend(parsed);
        }
        Ok(vars)
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = PathBuf::from(file);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}
