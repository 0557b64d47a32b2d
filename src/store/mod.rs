//! Storage seam for the booking core.
//!
//! All seat-status and counter mutations go through these traits; the
//! implementations guarantee each operation is atomic per entity, so two
//! concurrent callers can never both be granted the same seat. `PgStore` is
//! the durable implementation; `MemoryStore` backs tests and local runs.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{Hold, Order, OrderStatus, Seat, SeatHoldRow, Ticket, TicketStatus, TicketType};
use crate::utils::AppError;

pub type StoreResult<T> = Result<T, AppError>;

/// Result of an all-or-nothing seat lock attempt. On denial no seat was
/// touched and the conflicting ids are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Granted,
    Denied { unavailable: Vec<Uuid> },
}

/// Authoritative view of seat status and ticket-type counters.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Locks every requested seat for `hold_owner`, or none of them.
    /// Unknown and inactive seats count as unavailable.
    async fn try_lock_seats(
        &self,
        seat_ids: &[Uuid],
        hold_owner: Uuid,
        ttl: Duration,
    ) -> StoreResult<LockOutcome>;

    /// LOCKED/RESERVED -> AVAILABLE. Idempotent; already-available seats
    /// are left untouched.
    async fn release_seats(&self, seat_ids: &[Uuid]) -> StoreResult<()>;

    /// BOOKED -> AVAILABLE, for order cancellation and refund completion.
    async fn unbook_seats(&self, seat_ids: &[Uuid]) -> StoreResult<()>;

    /// BOOKED -> LOCKED with `held_by = owner` and the given expiry.
    /// Restores a confirmed seat to its hold when a checkout is unwound;
    /// seats in any other status are left untouched.
    async fn relock_seats(
        &self,
        seat_ids: &[Uuid],
        owner: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// LOCKED/RESERVED held by `owner` -> BOOKED. Returns false with no
    /// partial effect if any seat is not confirmable by this owner.
    async fn confirm_seats(&self, seat_ids: &[Uuid], owner: Uuid) -> StoreResult<bool>;

    /// Atomically checks `sold_quantity + qty <= quantity` and increments.
    /// Returns false with no side effect on insufficient availability.
    async fn reserve_quantity(&self, ticket_type_id: Uuid, qty: i32) -> StoreResult<bool>;

    /// Decrements `sold_quantity`, floored at zero.
    async fn release_quantity(&self, ticket_type_id: Uuid, qty: i32) -> StoreResult<()>;

    async fn ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>>;

    /// Seats by id; unknown ids are simply absent from the result.
    async fn seats(&self, seat_ids: &[Uuid]) -> StoreResult<Vec<Seat>>;

    async fn available_quantity(&self, ticket_type_id: Uuid) -> StoreResult<i32>;
}

/// Persistence for seat holds. State changes are conditional updates that
/// act as claims: concurrent writers cannot both transition the same row.
#[async_trait]
pub trait HoldStore: Send + Sync {
    /// Writes one ACTIVE row per seat of a freshly granted hold.
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()>;

    async fn hold_rows(&self, hold_id: Uuid) -> StoreResult<Vec<SeatHoldRow>>;

    /// ACTIVE, unexpired rows owned by `user_id` -> PROMOTED. Returns the
    /// seat ids claimed; empty when nothing was claimable.
    async fn claim_promote(
        &self,
        hold_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>>;

    /// ACTIVE rows -> RELEASED. Returns the seat ids claimed; empty when
    /// the hold was already terminal, which is not an error.
    async fn claim_release(&self, hold_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// PROMOTED rows -> ACTIVE. Reopens a hold whose checkout failed after
    /// promotion; empty when nothing was promoted.
    async fn claim_reinstate(&self, hold_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// ACTIVE rows with `expires_at < now` -> EXPIRED, across all holds.
    /// The conditional update is the claim step that keeps concurrent
    /// sweepers from double-releasing the same seats.
    async fn claim_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<SeatHoldRow>>;
}

/// Persistence for orders and their tickets.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the order and all tickets as one unit.
    async fn insert_order(&self, order: &Order, tickets: &[Ticket]) -> StoreResult<()>;

    async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

    async fn order_tickets(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>>;

    /// Removes the order and its tickets. Compensation path only; orders
    /// that reached a terminal state are never deleted.
    async fn delete_order(&self, order_id: Uuid) -> StoreResult<()>;

    /// Conditional transition `from -> to`; returns false if the order was
    /// not in `from`, leaving it untouched.
    async fn update_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool>;

    async fn set_tickets_status(&self, order_id: Uuid, status: TicketStatus) -> StoreResult<()>;
}

/// Everything the services need from one backing store.
pub trait BookingStore: InventoryStore + HoldStore + OrderStore {}

impl<T: InventoryStore + HoldStore + OrderStore> BookingStore for T {}
