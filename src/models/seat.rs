use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a physical seat. AVAILABLE -> LOCKED/RESERVED -> BOOKED,
/// or back to AVAILABLE on release. Only the inventory store mutates this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "seat_status", rename_all = "UPPERCASE")]
pub enum SeatStatus {
    Available,
    Locked,
    Reserved,
    Booked,
}

impl SeatStatus {
    /// A seat in this state can be granted to a new hold.
    pub fn is_grantable(self) -> bool {
        matches!(self, SeatStatus::Available)
    }

    /// A seat in this state is held and may be confirmed or released.
    pub fn is_held(self) -> bool {
        matches!(self, SeatStatus::Locked | SeatStatus::Reserved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seat {
    pub id: Uuid,
    pub ticket_type_id: Uuid,
    pub row_label: String,
    pub seat_number: i32,
    pub area: Option<String>,
    pub status: SeatStatus,
    /// Hold owner while LOCKED/RESERVED; cleared on release and confirm.
    pub held_by: Option<Uuid>,
    /// When the current hold lapses; informational, the hold row decides.
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
