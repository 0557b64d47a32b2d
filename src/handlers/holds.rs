use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Duration;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success};

#[derive(Deserialize)]
pub struct CreateHoldRequest {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    /// Overrides the configured default when present.
    pub ttl_seconds: Option<i64>,
}

pub async fn create_hold(
    State(state): State<AppState>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<Response, AppError> {
    let ttl = req.ttl_seconds.map(Duration::seconds);
    let hold = state
        .reservations
        .create_hold(req.user_id, req.event_id, &req.seat_ids, ttl)
        .await?;
    Ok(created(hold, "Hold granted").into_response())
}

pub async fn release_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state
        .reservations
        .release_hold(hold_id, "released by client")
        .await?;
    Ok(empty_success("Hold released").into_response())
}
