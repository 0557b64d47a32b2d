use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{availability, health_check, holds, orders, sweep_expired};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/holds", post(holds::create_hold))
        .route("/holds/:hold_id", delete(holds::release_hold))
        .route("/orders", post(orders::create_order))
        .route("/orders/:order_id", get(orders::get_order))
        .route("/orders/:order_id/cancel", post(orders::cancel_order))
        .route("/orders/:order_id/payment", post(orders::pay_order))
        .route("/orders/:order_id/complete", post(orders::complete_order))
        .route(
            "/ticket-types/:ticket_type_id/availability",
            get(availability),
        )
        // Scheduler-facing surface, not for end users.
        .route("/internal/sweep", post(sweep_expired))
        .route(
            "/internal/orders/:order_id/refund-complete",
            post(orders::complete_refund),
        )
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
