//! Error types for the dump engine.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dump operations.
#[derive(Error, Debug)]
pub enum DumpError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The dump destination is already present on disk.
    #[error("Dump '{}' already exists", path.display())]
    DestinationExists { path: PathBuf },

    /// Could not establish the database connection
    #[error("Connection error: {0}")]
    Connect(#[source] sqlx::Error),

    /// A query against the database failed
    #[error("Query failed while {context}: {message}")]
    Query { context: String, message: String },

    /// The server described a different table than the one requested
    #[error("Returned table '{returned}' is not the same as requested table '{requested}'")]
    UnexpectedTableName { requested: String, returned: String },

    /// Table has no columns and cannot be described
    #[error("No columns in table '{table}'")]
    EmptySchema { table: String },

    /// Writing to the dump destination failed
    #[error("Sink error while {context}: {source}")]
    Sink {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error (file operations outside the sink)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DumpError {
    /// Create a Query error with context about where it occurred
    pub fn query(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        DumpError::Query {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Sink error from an I/O failure on the destination
    pub fn sink(source: std::io::Error, context: impl Into<String>) -> Self {
        DumpError::Sink {
            context: context.into(),
            source,
        }
    }

    /// Create an EmptySchema error for a table
    pub fn empty_schema(table: impl Into<String>) -> Self {
        DumpError::EmptySchema {
            table: table.into(),
        }
    }

    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DumpError::Config(_) | DumpError::Yaml(_) | DumpError::Json(_) => 1,
            DumpError::Connect(_) => 2,
            DumpError::Query { .. }
            | DumpError::UnexpectedTableName { .. }
            | DumpError::EmptySchema { .. } => 3,
            DumpError::DestinationExists { .. } => 4,
            DumpError::Sink { .. } => 5,
            DumpError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
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

/// Result type alias for dump operations.
pub type Result<T> = std::result::Result<T, DumpError>;
