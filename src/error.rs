//! # Error Handling Module
//!
//! Provides structured error types for geoingest operations.
//! All errors are propagated with meaningful messages for API consumers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for geoingest operations
pub type GeoResult<T> = Result<T, GeoError>;

/// Comprehensive error type for all geoingest operations
#[derive(Error, Debug)]
pub enum GeoError {
    /// Database connection, DDL, or insert errors
    #[error("Database error: {0}")]
    Database(String),

    /// No file was included in the upload request
    #[error("No file was received in the 'geojson' form field")]
    MissingFile,

    /// Malformed multipart payload or unusable file name
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Uploaded file does not carry the expected extension
    #[error("Invalid file format: expected a .geojson file, got '{0}'")]
    InvalidExtension(String),

    /// Uploaded file is not the single accepted dataset
    #[error("Unexpected file name '{0}': the upload must be DEPARTAMENTOS.geojson")]
    UnexpectedFilename(String),

    /// Dataset parsed to zero rows
    #[error("The uploaded file is empty or contains no data rows")]
    EmptyDataset,

    /// A row does not match the fixed six-column shape
    #[error("Row {row} does not match the table structure: {reason}")]
    InvalidRow { row: usize, reason: String },

    /// CSV reader failure
    #[error("Failed to read dataset: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure while persisting or removing the upload
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GeoError {
    /// Returns the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GeoError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GeoError::MissingFile => StatusCode::BAD_REQUEST,
            GeoError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            GeoError::InvalidExtension(_) => StatusCode::BAD_REQUEST,
            GeoError::UnexpectedFilename(_) => StatusCode::BAD_REQUEST,
            GeoError::EmptyDataset => StatusCode::BAD_REQUEST,
            GeoError::InvalidRow { .. } => StatusCode::BAD_REQUEST,
            GeoError::Csv(_) => StatusCode::BAD_REQUEST,
            GeoError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GeoError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            GeoError::Database(_) => "DATABASE_ERROR",
            GeoError::MissingFile => "MISSING_FILE",
            GeoError::InvalidUpload(_) => "INVALID_UPLOAD",
            GeoError::InvalidExtension(_) => "INVALID_EXTENSION",
            GeoError::UnexpectedFilename(_) => "UNEXPECTED_FILENAME",
            GeoError::EmptyDataset => "EMPTY_DATASET",
            GeoError::InvalidRow { .. } => "ROW_MISMATCH",
            GeoError::Csv(_) => "DATASET_READ_ERROR",
            GeoError::Io(_) => "FILE_ERROR",
            GeoError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Converts GeoError into an Axum HTTP response
impl IntoResponse for GeoError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            },
            "success": false,
        }));

        (status, body).into_response()
    }
}

/// Convert tokio-postgres errors to GeoError
impl From<tokio_postgres::Error> for GeoError {
    fn from(err: tokio_postgres::Error) -> Self {
        GeoError::Database(err.to_string())
    }
}

/// Convert pool checkout errors to GeoError
impl From<deadpool_postgres::PoolError> for GeoError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        GeoError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        assert_eq!(GeoError::MissingFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GeoError::InvalidExtension("data.json".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GeoError::UnexpectedFilename("other.geojson".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GeoError::EmptyDataset.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GeoError::InvalidRow {
                row: 3,
                reason: "7 fields".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_processing_errors_are_server_errors() {
        assert_eq!(
            GeoError::Database("insert failed".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GeoError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(GeoError::MissingFile.error_code(), "MISSING_FILE");
        assert_eq!(GeoError::EmptyDataset.error_code(), "EMPTY_DATASET");
        assert_eq!(
            GeoError::InvalidRow {
                row: 1,
                reason: String::new()
            }
            .error_code(),
            "ROW_MISMATCH"
        );
    }
}
