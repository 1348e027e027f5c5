//! Error types for the Hikaze catalog.
//!
//! Every fallible operation in the core returns [`HikazeError`]. The variants
//! follow the catalog's error taxonomy so the HTTP layer can translate them
//! into status codes without inspecting messages.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the catalog engine.
#[derive(Debug, Error)]
pub enum HikazeError {
    // Lookup errors
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // Input errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Singleton job already active
    #[error("Job already running: {job}")]
    Conflict { job: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, HikazeError>;

impl From<std::io::Error> for HikazeError {
    fn from(err: std::io::Error) -> Self {
        HikazeError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for HikazeError {
    fn from(err: serde_json::Error) -> Self {
        HikazeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for HikazeError {
    fn from(err: rusqlite::Error) -> Self {
        HikazeError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl HikazeError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        HikazeError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for a missing model row.
    pub fn model_not_found(id: impl ToString) -> Self {
        HikazeError::NotFound {
            entity: "model",
            id: id.to_string(),
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        HikazeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the failure came from the storage layer.
    ///
    /// A storage failure ends a running scan; anything else raised while
    /// processing a single file only counts against that file.
    pub fn is_store_error(&self) -> bool {
        matches!(self, HikazeError::Database { .. })
    }

    /// HTTP status code the API layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            HikazeError::NotFound { .. } => 404,
            HikazeError::Validation { .. } => 400,
            HikazeError::Conflict { .. } => 409,
            _ => 500,
        }
    }

    /// Stable machine-readable error code for response bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            HikazeError::NotFound { .. } => "NOT_FOUND",
            HikazeError::Validation { .. } => "VALIDATION_ERROR",
            HikazeError::Conflict { .. } => "JOB_RUNNING",
            _ => "INTERNAL_ERROR",
        }
    }
}
