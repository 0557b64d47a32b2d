use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;
use crate::store::InventoryStore;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod holds;
pub mod orders;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "boxoffice-api",
    };

    success(payload, "Health check successful").into_response()
}

pub async fn availability(
    State(state): State<AppState>,
    Path(ticket_type_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let available = state.store.available_quantity(ticket_type_id).await?;
    let payload = json!({
        "ticket_type_id": ticket_type_id,
        "available": available,
    });
    Ok(success(payload, "Availability").into_response())
}

/// Entry point for the external scheduler; the in-process interval task
/// calls the same service method.
pub async fn sweep_expired(State(state): State<AppState>) -> Result<Response, AppError> {
    let expired = state.reservations.sweep_expired().await?;
    Ok(success(json!({ "expired_holds": expired }), "Sweep finished").into_response())
}
