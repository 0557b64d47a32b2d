use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Order, Ticket};
use crate::services::LineItem;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub hold_ids: Vec<Uuid>,
    pub discount_code: Option<String>,
}

#[derive(Serialize)]
pub struct OrderPayload {
    pub order: Order,
    pub tickets: Vec<Ticket>,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, AppError> {
    let (order, tickets) = state
        .orders
        .create_order(
            req.user_id,
            &req.items,
            &req.hold_ids,
            req.discount_code.as_deref(),
        )
        .await?;
    Ok(created(OrderPayload { order, tickets }, "Order created").into_response())
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (order, tickets) = state.orders.get_order(order_id).await?;
    Ok(success(OrderPayload { order, tickets }, "Order found").into_response())
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let outcome = state.orders.cancel_order(order_id).await?;
    let message = outcome.message.clone();
    Ok(success(outcome, message).into_response())
}

/// Payment-gateway confirmation callback.
pub async fn pay_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = state.orders.mark_paid(order_id).await?;
    Ok(success(order, "Order marked as paid").into_response())
}

pub async fn complete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = state.orders.complete_order(order_id).await?;
    Ok(success(order, "Order completed").into_response())
}

/// Refund-workflow completion callback; only now is inventory released.
pub async fn complete_refund(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = state.orders.complete_refund(order_id).await?;
    Ok(success(order, "Refund completed").into_response())
}
