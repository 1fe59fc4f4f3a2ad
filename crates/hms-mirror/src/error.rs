//! Error types for the migration planner.

use thiserror::Error;

/// Main error type for planning and run operations.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration combination that can't be planned. Blocks the whole run.
    #[error("Configuration incompatibility [{code}]: {message}")]
    ConfigIncompatible { code: &'static str, message: String },

    /// Metadata could not be fetched for a table or database
    #[error("Metadata error for {table}: {message}")]
    Metadata { table: String, message: String },

    /// A storage location could not be translated
    #[error("Location translation failed for `{location}`: {message}")]
    Translation { location: String, message: String },

    /// Planning reached a state that upstream checks should have prevented.
    /// Aborts the affected table only.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Statement execution failed against a cluster
    #[error("Execution failed on {environment}: {message}")]
    Execution { environment: String, message: String },

    /// State file error
    #[error("State file error: {0}")]
    State(String),

    /// Config hash mismatch on resume
    #[error("Config has changed since last run - cannot resume. Start a fresh run instead.")]
    ConfigChanged,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid filter expression
    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Run cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Create a coded configuration-incompatibility error.
    pub fn incompatible(code: &'static str, message: impl Into<String>) -> Self {
        MirrorError::ConfigIncompatible {
            code,
            message: message.into(),
        }
    }

    /// Create a Metadata error
    pub fn metadata(table: impl Into<String>, message: impl Into<String>) -> Self {
        MirrorError::Metadata {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Translation error
    pub fn translation(location: impl Into<String>, message: impl Into<String>) -> Self {
        MirrorError::Translation {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create an Execution error
    pub fn execution(environment: impl ToString, message: impl Into<String>) -> Self {
        MirrorError::Execution {
            environment: environment.to_string(),
            message: message.into(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MirrorError::Config(_)
            | MirrorError::ConfigIncompatible { .. }
            | MirrorError::Yaml(_)
            | MirrorError::Regex(_) => 2,
            MirrorError::State(_) | MirrorError::ConfigChanged => 3,
            MirrorError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for planner operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
