//! Batch control handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;
use vharvest_models::ProgressSnapshot;
use vharvest_worker::{parse_link_table, RetryStart};

use crate::error::ApiResult;
use crate::state::AppState;

/// Reply to a batch control call.
#[derive(Debug, Serialize)]
pub struct BatchStatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl BatchStatusResponse {
    fn with_status(status: &'static str) -> Self {
        Self { status, total: None }
    }

    fn started(total: usize) -> Self {
        Self {
            status: "started",
            total: Some(total),
        }
    }
}

/// Start a batch over the CSV table in the request body.
pub async fn start_batch(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<(StatusCode, Json<BatchStatusResponse>)> {
    let rows = parse_link_table(&body)?;
    let total = state.service.start(rows).await?;
    info!(total, "Batch started via API");
    Ok((StatusCode::ACCEPTED, Json(BatchStatusResponse::started(total))))
}

/// Raise the stop flag.
pub async fn stop_batch(State(state): State<AppState>) -> ApiResult<Json<BatchStatusResponse>> {
    state.service.signal_stop().await?;
    info!("Stop requested via API");
    Ok(Json(BatchStatusResponse::with_status("stopped")))
}

pub async fn get_progress(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    Json(state.service.poll_progress().await)
}

/// Reprocess the rows the last ledger marks as failed.
pub async fn retry_batch(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<BatchStatusResponse>)> {
    match state.service.retry().await? {
        RetryStart::Started(total) => {
            info!(total, "Retry started via API");
            Ok((StatusCode::ACCEPTED, Json(BatchStatusResponse::started(total))))
        }
        RetryStart::NothingToRetry => Ok((
            StatusCode::OK,
            Json(BatchStatusResponse::with_status("nothing_to_retry")),
        )),
    }
}

/// Clear the stop flag, progress and the work directory.
pub async fn reset_batch(State(state): State<AppState>) -> ApiResult<Json<BatchStatusResponse>> {
    state.service.reset().await?;
    Ok(Json(BatchStatusResponse::with_status("success")))
}
