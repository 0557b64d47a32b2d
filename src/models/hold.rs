use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Durable states of a seat hold. A hold row is only written after the
/// inventory grant succeeded, so ACTIVE is the first persisted state.
/// EXPIRED, RELEASED and PROMOTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "hold_state", rename_all = "UPPERCASE")]
pub enum HoldState {
    Active,
    Expired,
    Released,
    Promoted,
}

impl HoldState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, HoldState::Active)
    }
}

/// One reserved seat. Rows sharing a `hold_id` were granted together and
/// are promoted or released together.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SeatHoldRow {
    pub id: Uuid,
    pub hold_id: Uuid,
    pub seat_id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: HoldState,
}

/// Aggregate view of a granted hold, as returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
