//! Job API handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use tubetone_core::{parse_video_ids, CancellationRegistry, JobSnapshot};

use crate::metrics::TERMINATE_REQUESTS;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for enqueueing
#[derive(Debug, Deserialize)]
pub struct EnqueueParams {
    /// Client session id
    pub c: Option<String>,
    /// Video ids separated by newlines, commas or spaces
    pub v: Option<String>,
}

/// Query parameters for terminating a job
#[derive(Debug, Deserialize)]
pub struct TerminateParams {
    /// Invocation id returned by enqueue
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateResponse {
    pub invocation_id: String,
}

/// Error response for job operations
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<JobErrorResponse>);

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(JobErrorResponse {
            error: message.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Resolve, look up and enqueue a batch of video ids.
///
/// Ids come from the `v` query value, or from the request body when `v` is absent.
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EnqueueParams>,
    body: String,
) -> Result<Json<Vec<JobSnapshot>>, ApiError> {
    let session = params
        .c
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| bad_request("Missing client session id (c)"))?;

    let raw = params.v.as_deref().unwrap_or(&body);
    let ids = parse_video_ids(raw);
    info!(session, count = ids.len(), "Enqueue request");

    let items = state.dispatcher().dispatch(&ids, session).await;
    Ok(Json(items.into_iter().map(JobSnapshot::from).collect()))
}

/// Request cancellation of an invocation. Unknown ids are accepted.
pub async fn terminate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TerminateParams>,
) -> Result<Json<TerminateResponse>, ApiError> {
    let invocation_id = params
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| bad_request("Missing invocation id (id)"))?;

    TERMINATE_REQUESTS.inc();
    info!(invocation_id, "Terminate requested");
    state.registry().request_cancel(invocation_id);

    Ok(Json(TerminateResponse {
        invocation_id: invocation_id.to_string(),
    }))
}

/// Every cached artifact.
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<JobSnapshot>>, ApiError> {
    match state.cache().list_all().await {
        Ok(items) => Ok(Json(items.into_iter().map(JobSnapshot::from).collect())),
        Err(e) => {
            error!("Failed to list cache: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(JobErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
