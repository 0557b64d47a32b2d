use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Hold, HoldState, Order, OrderStatus, Seat, SeatHoldRow, SeatStatus, Ticket, TicketStatus,
    TicketType,
};
use crate::store::{
    HoldStore, InventoryStore, LockOutcome, OrderStore, StoreResult,
};
use crate::utils::AppError;

#[derive(Default)]
struct World {
    seats: HashMap<Uuid, Seat>,
    ticket_types: HashMap<Uuid, TicketType>,
    holds: Vec<SeatHoldRow>,
    orders: HashMap<Uuid, Order>,
    tickets: HashMap<Uuid, Ticket>,
}

/// In-memory store with the same per-operation atomicity contract as
/// `PgStore`: one mutex plays the role of the database's row locks. Backs
/// the test suite and local runs without a database.
#[derive(Default)]
pub struct MemoryStore {
    world: Mutex<World>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a ticket type and returns its id.
    pub async fn seed_ticket_type(
        &self,
        event_id: Uuid,
        price: Decimal,
        quantity: i32,
        max_per_order: i32,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let tt = TicketType {
            id,
            event_id,
            name: format!("tier-{}", &id.simple().to_string()[..6]),
            price,
            quantity,
            sold_quantity: 0,
            max_per_order,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.world.lock().await.ticket_types.insert(id, tt);
        id
    }

    /// Seeds an AVAILABLE seat under a ticket type and returns its id.
    pub async fn seed_seat(&self, ticket_type_id: Uuid, row_label: &str, seat_number: i32) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let seat = Seat {
            id,
            ticket_type_id,
            row_label: row_label.to_string(),
            seat_number,
            area: None,
            status: SeatStatus::Available,
            held_by: None,
            hold_expires_at: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.world.lock().await.seats.insert(id, seat);
        id
    }

    pub async fn seat(&self, seat_id: Uuid) -> Option<Seat> {
        self.world.lock().await.seats.get(&seat_id).cloned()
    }

    /// Maintenance override of a seat's state, bypassing the transition
    /// rules. Tests use it to stage contention and mid-flight faults.
    pub async fn force_seat(&self, seat_id: Uuid, status: SeatStatus, held_by: Option<Uuid>) {
        let mut world = self.world.lock().await;
        if let Some(seat) = world.seats.get_mut(&seat_id) {
            seat.status = status;
            seat.held_by = held_by;
            seat.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn try_lock_seats(
        &self,
        seat_ids: &[Uuid],
        hold_owner: Uuid,
        ttl: Duration,
    ) -> StoreResult<LockOutcome> {
        let mut ids = seat_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut world = self.world.lock().await;

        let mut unavailable: Vec<Uuid> = Vec::new();
        for id in &ids {
            match world.seats.get(id) {
                Some(seat) if seat.active && seat.status.is_grantable() => {}
                _ => unavailable.push(*id),
            }
        }
        if !unavailable.is_empty() {
            return Ok(LockOutcome::Denied { unavailable });
        }

        let expires_at = Utc::now() + ttl;
        for id in &ids {
            let seat = world.seats.get_mut(id).ok_or_else(|| {
                AppError::NotFound(format!("Seat '{id}' was not found"))
            })?;
            seat.status = SeatStatus::Locked;
            seat.held_by = Some(hold_owner);
            seat.hold_expires_at = Some(expires_at);
            seat.updated_at = Utc::now();
        }
        Ok(LockOutcome::Granted)
    }

    async fn release_seats(&self, seat_ids: &[Uuid]) -> StoreResult<()> {
        let mut world = self.world.lock().await;
        for id in seat_ids {
            if let Some(seat) = world.seats.get_mut(id) {
                if seat.status.is_held() {
                    seat.status = SeatStatus::Available;
                    seat.held_by = None;
                    seat.hold_expires_at = None;
                    seat.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn unbook_seats(&self, seat_ids: &[Uuid]) -> StoreResult<()> {
        let mut world = self.world.lock().await;
        for id in seat_ids {
            if let Some(seat) = world.seats.get_mut(id) {
                if seat.status == SeatStatus::Booked {
                    seat.status = SeatStatus::Available;
                    seat.held_by = None;
                    seat.hold_expires_at = None;
                    seat.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn relock_seats(
        &self,
        seat_ids: &[Uuid],
        owner: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut world = self.world.lock().await;
        for id in seat_ids {
            if let Some(seat) = world.seats.get_mut(id) {
                if seat.status == SeatStatus::Booked {
                    seat.status = SeatStatus::Locked;
                    seat.held_by = Some(owner);
                    seat.hold_expires_at = Some(expires_at);
                    seat.updated_at = Utc::now();
                }
            }
        }
        Ok(())
    }

    async fn confirm_seats(&self, seat_ids: &[Uuid], owner: Uuid) -> StoreResult<bool> {
        let mut world = self.world.lock().await;

        let confirmable = seat_ids.iter().all(|id| {
            world
                .seats
                .get(id)
                .map(|seat| seat.status.is_held() && seat.held_by == Some(owner))
                .unwrap_or(false)
        });
        if !confirmable {
            return Ok(false);
        }

        for id in seat_ids {
            let seat = world.seats.get_mut(id).ok_or_else(|| {
                AppError::NotFound(format!("Seat '{id}' was not found"))
            })?;
            seat.status = SeatStatus::Booked;
            seat.held_by = None;
            seat.hold_expires_at = None;
            seat.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn reserve_quantity(&self, ticket_type_id: Uuid, qty: i32) -> StoreResult<bool> {
        let mut world = self.world.lock().await;
        match world.ticket_types.get_mut(&ticket_type_id) {
            Some(tt) if tt.active && tt.sold_quantity + qty <= tt.quantity => {
                tt.sold_quantity += qty;
                tt.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_quantity(&self, ticket_type_id: Uuid, qty: i32) -> StoreResult<()> {
        let mut world = self.world.lock().await;
        if let Some(tt) = world.ticket_types.get_mut(&ticket_type_id) {
            tt.sold_quantity = (tt.sold_quantity - qty).max(0);
            tt.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        Ok(self.world.lock().await.ticket_types.get(&id).cloned())
    }

    async fn seats(&self, seat_ids: &[Uuid]) -> StoreResult<Vec<Seat>> {
        let world = self.world.lock().await;
        let mut found: Vec<Seat> = seat_ids
            .iter()
            .filter_map(|id| world.seats.get(id).cloned())
            .collect();
        found.sort_by_key(|seat| seat.id);
        found.dedup_by_key(|seat| seat.id);
        Ok(found)
    }

    async fn available_quantity(&self, ticket_type_id: Uuid) -> StoreResult<i32> {
        self.world
            .lock()
            .await
            .ticket_types
            .get(&ticket_type_id)
            .map(TicketType::available)
            .ok_or_else(|| {
                AppError::NotFound(format!("Ticket type '{ticket_type_id}' was not found"))
            })
    }
}

#[async_trait]
impl HoldStore for MemoryStore {
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()> {
        let mut world = self.world.lock().await;
        for seat_id in &hold.seat_ids {
            world.holds.push(SeatHoldRow {
                id: Uuid::new_v4(),
                hold_id: hold.id,
                seat_id: *seat_id,
                user_id: hold.user_id,
                event_id: hold.event_id,
                reserved_at: hold.reserved_at,
                expires_at: hold.expires_at,
                state: HoldState::Active,
            });
        }
        Ok(())
    }

    async fn hold_rows(&self, hold_id: Uuid) -> StoreResult<Vec<SeatHoldRow>> {
        let world = self.world.lock().await;
        let mut rows: Vec<SeatHoldRow> = world
            .holds
            .iter()
            .filter(|row| row.hold_id == hold_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.seat_id);
        Ok(rows)
    }

    async fn claim_promote(
        &self,
        hold_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>> {
        let mut world = self.world.lock().await;
        let mut claimed = Vec::new();
        for row in world.holds.iter_mut() {
            if row.hold_id == hold_id
                && row.user_id == user_id
                && row.state == HoldState::Active
                && row.expires_at > now
            {
                row.state = HoldState::Promoted;
                claimed.push(row.seat_id);
            }
        }
        Ok(claimed)
    }

    async fn claim_release(&self, hold_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut world = self.world.lock().await;
        let mut claimed = Vec::new();
        for row in world.holds.iter_mut() {
            if row.hold_id == hold_id && row.state == HoldState::Active {
                row.state = HoldState::Released;
                claimed.push(row.seat_id);
            }
        }
        Ok(claimed)
    }

    async fn claim_reinstate(&self, hold_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut world = self.world.lock().await;
        let mut claimed = Vec::new();
        for row in world.holds.iter_mut() {
            if row.hold_id == hold_id && row.state == HoldState::Promoted {
                row.state = HoldState::Active;
                claimed.push(row.seat_id);
            }
        }
        Ok(claimed)
    }

    async fn claim_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<SeatHoldRow>> {
        let mut world = self.world.lock().await;
        let mut claimed = Vec::new();
        for row in world.holds.iter_mut() {
            if row.state == HoldState::Active && row.expires_at < now {
                row.state = HoldState::Expired;
                claimed.push(row.clone());
            }
        }
        Ok(claimed)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order, tickets: &[Ticket]) -> StoreResult<()> {
        let mut world = self.world.lock().await;
        world.orders.insert(order.id, order.clone());
        for ticket in tickets {
            world.tickets.insert(ticket.id, ticket.clone());
        }
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.world.lock().await.orders.get(&order_id).cloned())
    }

    async fn order_tickets(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let world = self.world.lock().await;
        let mut tickets: Vec<Ticket> = world
            .tickets
            .values()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn delete_order(&self, order_id: Uuid) -> StoreResult<()> {
        let mut world = self.world.lock().await;
        world.orders.remove(&order_id);
        world.tickets.retain(|_, t| t.order_id != order_id);
        Ok(())
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool> {
        let mut world = self.world.lock().await;
        match world.orders.get_mut(&order_id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_tickets_status(&self, order_id: Uuid, status: TicketStatus) -> StoreResult<()> {
        let mut world = self.world.lock().await;
        for ticket in world.tickets.values_mut() {
            if ticket.order_id == order_id {
                ticket.status = status;
            }
        }
        Ok(())
    }
}
