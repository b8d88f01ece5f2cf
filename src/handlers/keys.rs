//! Upload key issuance HTTP handler.

use axum::{Json, extract::State};

use crate::{
    AppState,
    error::AppError,
    models::upload_key::{IssueKeyRequest, IssueKeyResponse},
};

/// Issue a new upload key.
///
/// # Endpoint
///
/// `POST /api/v1/keys`
///
/// # Request Body
///
/// ```json
/// { "requester": "alice" }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{ "resultStatus": "success", "key": "F7K2QX0B" }`
/// - **Error (400)**: empty or missing requester
/// - **Error (500)**: random source or store failure
///
/// Every failure is reported to telemetry before the error envelope is
/// written.
pub async fn issue_key(
    State(state): State<AppState>,
    Json(request): Json<IssueKeyRequest>,
) -> Result<Json<IssueKeyResponse>, AppError> {
    match state.issuer.issue(&request.requester).await {
        Ok(key) => Ok(Json(IssueKeyResponse::success(key))),
        Err(err) => {
            state.reporter.report("issuing upload key", &err);
            Err(err)
        }
    }
}
