//! Expiry sweep trigger HTTP handler.

use axum::{extract::State, http::StatusCode};
use chrono::Utc;

use crate::AppState;

/// Trigger an expiry sweep.
///
/// # Endpoint
///
/// `POST /api/v1/sweep`
///
/// Fire-and-forget: the sweep runs in a background task and the response is
/// an empty 202 Accepted regardless of the sweep's outcome. Failures go to
/// the error reporter, never to the HTTP caller.
pub async fn trigger_sweep(State(state): State<AppState>) -> StatusCode {
    let reaper = state.reaper.clone();
    let shutdown = state.shutdown.clone();

    tokio::spawn(async move {
        // Fatal errors were already reported inside the sweep
        if let Err(err) = reaper.sweep(Utc::now(), &shutdown).await {
            tracing::debug!(%err, "triggered sweep aborted");
        }
    });

    StatusCode::ACCEPTED
}
