//! Error types for assertive.
//!
//! Library code returns [`Error`]; task-level failures raised by modules use
//! [`ModuleError`](crate::modules::ModuleError) and are reported through the
//! event stream instead of aborting the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for assertive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for assertive.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Playbook Errors
    // ========================================================================
    /// Error parsing a playbook file.
    #[error("Failed to parse playbook '{path}': {message}")]
    PlaybookParse {
        /// Path to the playbook file
        path: PathBuf,
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error validating playbook structure.
    #[error("Playbook validation failed: {0}")]
    PlaybookValidation(String),

    // ========================================================================
    // Module Errors
    // ========================================================================
    /// Module not found.
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    /// Invalid module arguments.
    #[error("Invalid arguments for module '{module}': {message}")]
    ModuleArgs {
        /// Module name
        module: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Template Errors
    // ========================================================================
    /// Condition or template evaluation failed.
    #[error("Failed to evaluate '{expression}': {message}")]
    Evaluation {
        /// The expression or template source
        expression: String,
        /// Error message
        message: String,
    },

    /// Template error.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    // ========================================================================
    // Report Errors
    // ========================================================================
    /// Writing the assertion report failed.
    #[error("Failed to write report to '{path}': {message}")]
    ReportWrite {
        /// Destination path
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // IO and Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new playbook parse error.
    pub fn playbook_parse(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::PlaybookParse {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a new evaluation error.
    pub fn evaluation(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Creates a new report write error.
    pub fn report_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ReportWrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::PlaybookParse { .. } | Error::PlaybookValidation(_) => 4,
            Error::ReportWrite { .. } => 5,
            _ => 1,
        }
    }
}
