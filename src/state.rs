use std::sync::Arc;

use crate::services::{OrderService, ReservationManager};
use crate::store::PgStore;

/// Shared handler state. The services clone cheaply; they all point at the
/// same store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PgStore>,
    pub reservations: ReservationManager<PgStore>,
    pub orders: OrderService<PgStore>,
}
