use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use pagesmith_api_types::{StatusMessage, TaskAcceptedResponse, TaskPayload};

use super::error::ApiError;
use super::state::HttpState;

const LIVENESS_MESSAGE: &str = "Pagesmith task server. POST a task to /handle_task";

pub async fn liveness() -> Json<StatusMessage> {
    Json(StatusMessage {
        message: LIVENESS_MESSAGE.to_string(),
    })
}

pub async fn handle_task(
    State(state): State<HttpState>,
    payload: Result<Json<TaskPayload>, JsonRejection>,
) -> Result<Json<TaskAcceptedResponse>, ApiError> {
    let Json(payload) = payload?;
    let accepted = state.tasks.handle(payload).await?;
    Ok(Json(TaskAcceptedResponse {
        status: "success".to_string(),
        repo: accepted.repo,
    }))
}
