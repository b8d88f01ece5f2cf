//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into the JSON envelope returned to API clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from store operations (insert,
///   expired-record enumeration, batch delete)
/// - **Random Source Errors**: The OS entropy source could not be read
/// - **Validation Errors**: Invalid request data (e.g. empty requester)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Store operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The cryptographic random source could not be read.
    ///
    /// Fatal to the current issue request. Key generation never falls back
    /// to a weaker source.
    #[error("Random source unavailable: {0}")]
    RandomSource(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("{0}")]
    Validation(String),

    /// A delete batch was submitted above the backend's mutation cap.
    ///
    /// The reaper never builds such a batch; seeing this error means a
    /// caller bypassed the batching logic.
    #[error("Delete batch of {size} exceeds the backend cap of {cap}")]
    BatchTooLarge { size: usize, cap: usize },
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return the service's JSON envelope:
/// ```json
/// {
///   "resultStatus": "error",
///   "errorMessage": "Human-readable error message"
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `Validation` → 400 Bad Request
/// - `RandomSource` → 500 Internal Server Error
/// - `Database` → 500 Internal Server Error (hides details from client)
/// - `BatchTooLarge` → 500 Internal Server Error
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::RandomSource(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate key".to_string(),
            ),
            // Store details stay out of the response body
            AppError::Database(_) | AppError::BatchTooLarge { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "resultStatus": "error",
            "errorMessage": message
        }));

        (status, body).into_response()
    }
}
