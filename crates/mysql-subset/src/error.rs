//! Error types for the subsetting library.

use thiserror::Error;

/// Main error type for subsetting operations.
#[derive(Error, Debug)]
pub enum SubsetError {
    /// Configuration error (missing file, invalid YAML, failed validation).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A table or its catalog metadata could not be resolved.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Table has no primary key, so its rows cannot be deduplicated.
    #[error("Table {0} has no primary key - rows cannot be deduplicated (set subset.allow_keyless_tables to key by full row)")]
    NoPrimaryKey(String),

    /// A source query failed.
    #[error("Fetch failed for table {table}: {message}")]
    Fetch { table: String, message: String },

    /// A single row could not be written to the target.
    #[error("Insert failed for table {table} (key {key}): {message}")]
    Insert {
        table: String,
        key: String,
        message: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SubsetError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        SubsetError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Fetch error
    pub fn fetch(table: impl Into<String>, message: impl ToString) -> Self {
        SubsetError::Fetch {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create an Insert error
    pub fn insert(table: impl Into<String>, key: impl ToString, message: impl ToString) -> Self {
        SubsetError::Insert {
            table: table.into(),
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error, used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            SubsetError::Config(_) | SubsetError::Yaml(_) => 1,
            SubsetError::Pool { .. } => 2,
            SubsetError::Schema(_) | SubsetError::NoPrimaryKey(_) => 3,
            SubsetError::Fetch { .. } => 4,
            SubsetError::Insert { .. } => 5,
            SubsetError::Json(_) => 6,
            SubsetError::Io(_) => 7,
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

/// Result type alias for subsetting operations.
pub type Result<T> = std::result::Result<T, SubsetError>;
