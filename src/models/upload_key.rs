//! Upload key data models and API request/response types.
//!
//! This module defines:
//! - `NewUploadKey`: the record persisted for every issued key
//! - `IssueKeyRequest`: request body for the issue endpoint
//! - `IssueKeyResponse`: success envelope returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A new upload key record, ready to be persisted.
///
/// # Database Table
///
/// Maps to the `upload_keys` table. The row id is assigned by the store on
/// insert and never appears here; callers get it back as an opaque
/// reference. Records are created by the issue endpoint, deleted by the
/// expiry reaper, and never updated in between.
#[derive(Debug, Clone)]
pub struct NewUploadKey {
    /// The generated key string (fixed length, uppercase alphanumeric)
    pub key: String,

    /// Who asked for the key. Always non-empty; validated at issue time.
    pub requester: String,

    /// Instant after which the key is expired and eligible for deletion.
    ///
    /// Always creation time plus the configured retention window.
    pub expiry: DateTime<Utc>,
}

/// Request body for issuing a new upload key.
///
/// # JSON Example
///
/// ```json
/// { "requester": "alice" }
/// ```
///
/// A missing `requester` field deserializes to an empty string and is
/// rejected by validation, the same way an explicit `""` is.
#[derive(Debug, Deserialize)]
pub struct IssueKeyRequest {
    #[serde(default)]
    pub requester: String,
}

/// Success envelope for the issue endpoint.
///
/// # JSON Example
///
/// ```json
/// { "resultStatus": "success", "key": "F7K2QX0B" }
/// ```
///
/// The error envelope (`resultStatus: "error"`) is produced by the
/// [`crate::error::AppError`] response conversion.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueKeyResponse {
    pub result_status: String,
    pub key: String,
}

impl IssueKeyResponse {
    pub fn success(key: String) -> Self {
        Self {
            result_status: "success".to_string(),
            key,
        }
    }
}
