//! Error types for download-btn
//!
//! This module provides error handling for the library, including:
//! - The request-boundary failures (authentication, unknown buttons)
//! - Pipeline failures (a step raised, a download entry is malformed)
//! - HTTP status code mapping for the endpoint layer
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::ButtonId;

/// Result type alias for download-btn operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which pipeline a step belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    /// Form-handling steps, run once per click before file creation
    FormHandling,
    /// File-creation steps, streamed to the client as progress events
    FileCreation,
}

impl Pipeline {
    /// Stable name used in storage and error details
    pub fn as_str(&self) -> &'static str {
        match self {
            Pipeline::FormHandling => "form_handling",
            Pipeline::FileCreation => "file_creation",
        }
    }

    /// Parse the stored pipeline name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "form_handling" => Some(Pipeline::FormHandling),
            "file_creation" => Some(Pipeline::FileCreation),
            _ => None,
        }
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for download-btn
#[derive(Debug, Error)]
pub enum Error {
    /// CSRF token mismatch, or no token stored for the session
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// `{id, cls}` does not resolve to a persisted button
    #[error("download button {cls}/{id} not found")]
    UnknownEntity {
        /// Identity taken from the request path
        id: ButtonId,
        /// Class name taken from the request path
        cls: String,
    },

    /// No button class registered under this name
    #[error("unknown download button class: {0}")]
    UnknownClass(String),

    /// A form-handling or file-creation step failed; the rest of its pipeline was skipped
    #[error("{pipeline} step {index} ({step}) failed: {reason}")]
    StepExecution {
        /// Pipeline the step belongs to
        pipeline: Pipeline,
        /// Ordering index of the failed step
        index: u32,
        /// Registered name of the failed step
        step: String,
        /// What went wrong
        reason: String,
    },

    /// A download entry is neither a bare URL nor a (url, filename) pair
    #[error("download entry {index} must be a URL or a (url, filename) pair, got {value}")]
    MalformedDownloadEntry {
        /// Position in the combined download list
        index: usize,
        /// The offending JSON value
        value: serde_json::Value,
    },

    /// A file-creation run is already streaming for this button
    #[error("a file-creation run is already in progress for button {id}")]
    RunInProgress {
        /// The busy button
        id: ButtonId,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "session.token_length")
        key: Option<String>,
    },

    /// Template rendering failed
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive could not be written
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a step failure, keeping the step's position for diagnostics
    pub fn step_failed(
        pipeline: Pipeline,
        index: u32,
        step: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Error::StepExecution {
            pipeline,
            index,
            step: step.into(),
            reason: reason.to_string(),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored column could not be decoded
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord {
        /// Row identity
        id: i64,
        /// What failed to decode
        reason: String,
    },
}

/// API error response format
///
/// Returned by every endpoint when a request fails.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "unknown_entity",
///     "message": "download button DownloadBtn/7 not found",
///     "details": { "id": 7, "cls": "DownloadBtn" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "authentication_failed")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,

            Error::Authentication(_) => 403,

            Error::UnknownEntity { .. } => 404,
            Error::UnknownClass(_) => 404,

            Error::RunInProgress { .. } => 409,

            Error::MalformedDownloadEntry { .. } => 422,

            Error::StepExecution { .. } => 500,
            Error::Template(_) => 500,
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Archive(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Authentication(_) => "authentication_failed",
            Error::UnknownEntity { .. } => "unknown_entity",
            Error::UnknownClass(_) => "unknown_class",
            Error::StepExecution { .. } => "step_failed",
            Error::MalformedDownloadEntry { .. } => "malformed_download_entry",
            Error::RunInProgress { .. } => "run_in_progress",
            Error::Config { .. } => "config_error",
            Error::Template(_) => "template_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Archive(_) => "archive_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::UnknownEntity { id, cls } => Some(serde_json::json!({
                "id": id,
                "cls": cls,
            })),
            Error::StepExecution {
                pipeline,
                index,
                step,
                ..
            } => Some(serde_json::json!({
                "pipeline": pipeline,
                "index": index,
                "step": step,
            })),
            Error::MalformedDownloadEntry { index, value } => Some(serde_json::json!({
                "index": index,
                "value": value,
            })),
            Error::RunInProgress { id } => Some(serde_json::json!({ "id": id })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn boundary_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Authentication("token mismatch".into()),
                403,
                "authentication_failed",
            ),
            (
                Error::UnknownEntity {
                    id: ButtonId(7),
                    cls: "DownloadBtn".into(),
                },
                404,
                "unknown_entity",
            ),
            (Error::UnknownClass("Nope".into()), 404, "unknown_class"),
            (
                Error::RunInProgress { id: ButtonId(3) },
                409,
                "run_in_progress",
            ),
            (
                Error::MalformedDownloadEntry {
                    index: 0,
                    value: serde_json::json!(42),
                },
                422,
                "malformed_download_entry",
            ),
            (
                Error::step_failed(Pipeline::FileCreation, 2, "zip", "disk full"),
                500,
                "step_failed",
            ),
            (
                Error::Config {
                    message: "too short".into(),
                    key: Some("session.token_length".into()),
                },
                400,
                "config_error",
            ),
            (Error::Other("boom".into()), 500, "internal_error"),
        ]
    }

    #[test]
    fn every_boundary_variant_maps_to_its_status_and_code() {
        for (error, status, code) in boundary_variants() {
            assert_eq!(error.status_code(), status, "status for {error}");
            assert_eq!(error.error_code(), code, "code for {error}");
        }
    }

    #[test]
    fn unknown_entity_details_carry_path_segments() {
        let api: ApiError = Error::UnknownEntity {
            id: ButtonId(7),
            cls: "DownloadBtn".into(),
        }
        .into();

        assert_eq!(api.error.code, "unknown_entity");
        let details = api.error.details.unwrap();
        assert_eq!(details["id"], 7);
        assert_eq!(details["cls"], "DownloadBtn");
    }

    #[test]
    fn step_failure_message_names_pipeline_and_step() {
        let error = Error::step_failed(Pipeline::FormHandling, 1, "select_files", "no field");
        let message = error.to_string();

        assert!(message.contains("form_handling"));
        assert!(message.contains("select_files"));
        assert!(message.contains("no field"));

        let api: ApiError = error.into();
        assert_eq!(api.error.details.unwrap()["pipeline"], "form_handling");
    }

    #[test]
    fn authentication_errors_have_no_details() {
        let api: ApiError = Error::Authentication("missing token".into()).into();
        assert!(api.error.details.is_none());
        assert!(api.error.message.contains("missing token"));
    }

    #[test]
    fn pipeline_names_round_trip() {
        for pipeline in [Pipeline::FormHandling, Pipeline::FileCreation] {
            assert_eq!(Pipeline::from_name(pipeline.as_str()), Some(pipeline));
        }
        assert_eq!(Pipeline::from_name("other"), None);
    }
}
