use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "ticket_status", rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
    Refunded,
}

/// A sold admission. Belongs to one order; deleted with it. A ticket that
/// references a seat implies that seat is BOOKED and no other active ticket
/// references the same seat.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    pub seat_id: Option<Uuid>,
    /// Short human-readable code, unique per ticket.
    pub ticket_code: String,
    pub price: Decimal,
    pub status: TicketStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn code_for(id: Uuid) -> String {
        format!("TKT-{}", &id.simple().to_string()[..12].to_uppercase())
    }
}
