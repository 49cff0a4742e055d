//! Handler error types with machine-readable error codes.
//!
//! `HandlerError` is what a client sees in the error envelope. The other
//! enums are internal and never cross the HTTP boundary unconverted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes carried in the `code` field of an error reply.
pub mod codes {
    /// Malformed or missing route parameters / headers.
    pub const INVALID_PARAMETERS: &str = "invalid_parameters";
    /// The storage handler refused the operation.
    pub const INVALID_OPERATION: &str = "invalid_operation";
    /// Requested allocation, file or connection does not exist.
    pub const NOT_FOUND: &str = "not_found";
    /// The handler succeeded but the transaction could not be committed.
    pub const COMMIT_ERROR: &str = "commit_error";
    /// Infrastructure failure outside the business handler.
    pub const INTERNAL_ERROR: &str = "internal_error";
    /// The request exceeded its operation timeout.
    pub const TIMEOUT: &str = "timeout";
}

/// Message returned with [`codes::COMMIT_ERROR`]. Engine details stay in the logs.
pub const COMMIT_ERROR_MESSAGE: &str = "Error committing to meta store";

/// Client-visible error with a string code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// Machine-readable kind
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl HandlerError {
    /// Create a new handler error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Invalid parameters - raised while building the request context
    pub fn invalid_parameters(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMETERS, details)
    }

    /// Operation rejected by business rules
    pub fn invalid_operation(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_OPERATION, details)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            codes::NOT_FOUND,
            format!("Resource not found: {}", resource.into()),
        )
    }

    /// Commit failure. The message is fixed so storage-engine internals never leak.
    pub fn commit_error() -> Self {
        Self::new(codes::COMMIT_ERROR, COMMIT_ERROR_MESSAGE)
    }

    /// Internal error
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            format!("Internal error: {}", details.into()),
        )
    }

    /// Request timeout
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(
            codes::TIMEOUT,
            format!("Request timeout: {}", operation.into()),
        )
    }

    /// True for the opaque commit-failure kind
    pub fn is_commit_error(&self) -> bool {
        self.code == codes::COMMIT_ERROR
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl Serialize for HandlerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("HandlerError", 2)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("error", &self.message)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for HandlerError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ErrorHelper {
            code: String,
            error: String,
        }

        let helper = ErrorHelper::deserialize(deserializer)?;
        Ok(HandlerError {
            code: helper.code,
            message: helper.error,
        })
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::invalid_parameters(format!("invalid json: {}", e))
    }
}

/// Result of a business handler: payload or error, never both
pub type OperationResult = Result<serde_json::Value, HandlerError>;

/// Metadata store errors (internal)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store has been released by the shutdown watcher
    #[error("metadata store is closed")]
    Closed,

    /// A key written by this transaction was committed by another one first
    #[error("write conflict on key {key}")]
    Conflict { key: String },

    /// Commit or rollback already ran on this transaction
    #[error("transaction already finished")]
    TransactionFinished,

    /// Backend-specific failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Server-level errors (not client-visible)
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server terminated with an I/O error
    #[error("server error: {0}")]
    Serve(String),
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid header name for {field}: {value}")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("client id and client key headers must differ")]
    DuplicateHeaders,

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
