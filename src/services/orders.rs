use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{HoldState, Order, OrderStatus, Ticket, TicketStatus};
use crate::services::discount::{DiscountValidator, PricedLine};
use crate::services::reservation::ReservationManager;
use crate::store::BookingStore;
use crate::utils::AppError;

/// One checkout line: a ticket type and either a plain quantity or a set
/// of specific seats (in which case `quantity` must match the seat count).
#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub seat_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub immediate: bool,
    pub message: String,
}

/// One hold's seats as staged for confirmation, with the expiry needed to
/// restore the seat locks if the checkout has to be unwound.
struct HeldGroup {
    hold_id: Uuid,
    seat_ids: Vec<Uuid>,
    expires_at: DateTime<Utc>,
}

/// Coordinates a checkout attempt across ticket types and seats. Every
/// failure path compensates fully: reserved quantities are returned,
/// confirmed seats un-booked, the order row removed, and the buyer's holds
/// left ACTIVE so a retry before TTL expiry can succeed.
pub struct OrderService<S> {
    store: Arc<S>,
    reservations: ReservationManager<S>,
    discounts: Arc<dyn DiscountValidator>,
}

impl<S> OrderService<S>
where
    S: BookingStore,
{
    pub fn new(
        store: Arc<S>,
        reservations: ReservationManager<S>,
        discounts: Arc<dyn DiscountValidator>,
    ) -> Self {
        Self {
            store,
            reservations,
            discounts,
        }
    }

    pub async fn create_order(
        &self,
        user_id: Uuid,
        items: &[LineItem],
        hold_ids: &[Uuid],
        discount_code: Option<&str>,
    ) -> Result<(Order, Vec<Ticket>), AppError> {
        if items.is_empty() {
            return Err(AppError::ValidationError(
                "An order needs at least one line item".to_string(),
            ));
        }

        // Per-type totals for the max_per_order check and pricing.
        let mut qty_per_type: HashMap<Uuid, i32> = HashMap::new();
        let mut requested_seats: HashSet<Uuid> = HashSet::new();
        for item in items {
            if item.quantity < 1 {
                return Err(AppError::ValidationError(
                    "Line item quantity must be at least 1".to_string(),
                ));
            }
            if !item.seat_ids.is_empty() && item.seat_ids.len() as i32 != item.quantity {
                return Err(AppError::ValidationError(
                    "Seated line items must list exactly one seat per ticket".to_string(),
                ));
            }
            for seat_id in &item.seat_ids {
                if !requested_seats.insert(*seat_id) {
                    return Err(AppError::ValidationError(format!(
                        "Seat '{seat_id}' appears more than once in the order"
                    )));
                }
            }
            *qty_per_type.entry(item.ticket_type_id).or_insert(0) += item.quantity;
        }

        let mut types = HashMap::new();
        let mut event_id = None;
        for (&type_id, &qty) in &qty_per_type {
            let tt = self
                .store
                .ticket_type(type_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Ticket type '{type_id}' was not found"))
                })?;
            if !tt.active {
                return Err(AppError::ValidationError(format!(
                    "Ticket type '{}' is not on sale",
                    tt.name
                )));
            }
            if qty > tt.max_per_order {
                return Err(AppError::ValidationError(format!(
                    "Ticket type '{}' allows at most {} tickets per order",
                    tt.name, tt.max_per_order
                )));
            }
            match event_id {
                None => event_id = Some(tt.event_id),
                Some(id) if id == tt.event_id => {}
                Some(_) => {
                    return Err(AppError::ValidationError(
                        "An order may only cover a single event".to_string(),
                    ));
                }
            }
            types.insert(type_id, tt);
        }
        let event_id = event_id.ok_or_else(|| {
            AppError::ValidationError("An order needs at least one line item".to_string())
        })?;

        // Every listed seat must belong to its line item's ticket type;
        // the ticket price follows the type, never the seat.
        if !requested_seats.is_empty() {
            let seat_list: Vec<Uuid> = requested_seats.iter().copied().collect();
            let seat_rows = self.store.seats(&seat_list).await?;
            let seat_types: HashMap<Uuid, Uuid> = seat_rows
                .iter()
                .map(|seat| (seat.id, seat.ticket_type_id))
                .collect();
            for item in items {
                for seat_id in &item.seat_ids {
                    match seat_types.get(seat_id) {
                        Some(type_id) if *type_id == item.ticket_type_id => {}
                        Some(_) => {
                            return Err(AppError::ValidationError(format!(
                                "Seat '{seat_id}' does not belong to ticket type '{}'",
                                types[&item.ticket_type_id].name
                            )));
                        }
                        None => {
                            return Err(AppError::NotFound(format!(
                                "Seat '{seat_id}' was not found"
                            )));
                        }
                    }
                }
            }
        }

        // Seated items require matching ACTIVE holds owned by the buyer,
        // consumed whole: the union of hold seats must be exactly the set
        // of requested seats.
        let now = Utc::now();
        let mut held: Vec<HeldGroup> = Vec::new();
        let mut held_seats: HashSet<Uuid> = HashSet::new();
        for &hold_id in hold_ids {
            let rows = self.store.hold_rows(hold_id).await?;
            if rows.is_empty() {
                return Err(AppError::NotFound(format!(
                    "Hold '{hold_id}' was not found"
                )));
            }
            let expires_at = rows[0].expires_at;
            let mut seat_ids = Vec::with_capacity(rows.len());
            for row in rows {
                if row.user_id != user_id {
                    return Err(AppError::ValidationError(format!(
                        "Hold '{hold_id}' belongs to another user"
                    )));
                }
                if row.state != HoldState::Active || row.expires_at <= now {
                    return Err(AppError::StateError(format!(
                        "Hold '{hold_id}' is no longer active"
                    )));
                }
                held_seats.insert(row.seat_id);
                seat_ids.push(row.seat_id);
            }
            held.push(HeldGroup {
                hold_id,
                seat_ids,
                expires_at,
            });
        }
        if held_seats != requested_seats {
            return Err(AppError::ValidationError(
                "The provided holds must cover exactly the requested seats".to_string(),
            ));
        }

        // Pricing. Money stays in Decimal end to end; the discount can
        // never push the final amount below zero.
        let priced: Vec<PricedLine> = qty_per_type
            .iter()
            .map(|(&type_id, &quantity)| PricedLine {
                ticket_type_id: type_id,
                quantity,
                unit_price: types[&type_id].price,
            })
            .collect();
        let total_amount: Decimal = priced
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum();
        let discount_amount = match discount_code {
            Some(code) => {
                let outcome = self.discounts.validate_and_calculate(code, &priced).await;
                if !outcome.valid {
                    return Err(AppError::ValidationError(outcome.message));
                }
                outcome.amount.max(Decimal::ZERO).min(total_amount)
            }
            None => Decimal::ZERO,
        };
        let final_amount = total_amount - discount_amount;

        // Effects, cheapest-to-undo first. Quantity counters come before
        // the order row; seat confirmation before hold promotion, so a
        // failed confirm leaves every hold ACTIVE.
        let mut reserved: Vec<(Uuid, i32)> = Vec::new();
        for item in items {
            if !item.seat_ids.is_empty() {
                continue;
            }
            if !self
                .store
                .reserve_quantity(item.ticket_type_id, item.quantity)
                .await?
            {
                self.rollback_quantities(&reserved).await;
                return Err(AppError::conflict(
                    format!(
                        "Ticket type '{}' does not have {} tickets left",
                        types[&item.ticket_type_id].name, item.quantity
                    ),
                    Vec::new(),
                ));
            }
            reserved.push((item.ticket_type_id, item.quantity));
        }

        let order_id = Uuid::new_v4();
        let order = Order {
            id: order_id,
            order_code: Order::code_for(order_id),
            user_id,
            event_id,
            total_amount,
            discount_amount,
            final_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let mut tickets = Vec::new();
        for item in items {
            let price = types[&item.ticket_type_id].price;
            if item.seat_ids.is_empty() {
                for _ in 0..item.quantity {
                    tickets.push(self.new_ticket(order_id, item.ticket_type_id, None, price));
                }
            } else {
                for seat_id in &item.seat_ids {
                    tickets.push(self.new_ticket(
                        order_id,
                        item.ticket_type_id,
                        Some(*seat_id),
                        price,
                    ));
                }
            }
        }

        if let Err(err) = self.store.insert_order(&order, &tickets).await {
            self.rollback_quantities(&reserved).await;
            return Err(err);
        }

        let mut confirmed: Vec<&HeldGroup> = Vec::new();
        for group in &held {
            if !self
                .store
                .confirm_seats(&group.seat_ids, group.hold_id)
                .await?
            {
                warn!(
                    order = %order_id,
                    hold = %group.hold_id,
                    "Seat confirmation failed mid-order; compensating"
                );
                self.compensate(order_id, &confirmed, &[], &reserved).await;
                return Err(AppError::conflict(
                    "Seats could no longer be confirmed",
                    group.seat_ids.clone(),
                ));
            }
            confirmed.push(group);
        }

        let mut promoted: Vec<Uuid> = Vec::new();
        for group in &held {
            if let Err(err) = self.reservations.promote_hold(group.hold_id, user_id).await {
                warn!(
                    order = %order_id,
                    hold = %group.hold_id,
                    "Hold promotion failed mid-order; compensating"
                );
                self.compensate(order_id, &confirmed, &promoted, &reserved)
                    .await;
                return Err(err);
            }
            promoted.push(group.hold_id);
        }

        info!(
            order = %order.id,
            code = %order.order_code,
            user = %user_id,
            tickets = tickets.len(),
            total = %order.final_amount,
            "Order created"
        );
        Ok((order, tickets))
    }

    /// PENDING orders cancel immediately and return their inventory. PAID
    /// orders enter the refund workflow instead; their inventory is only
    /// released when the refund completes, never while it is pending.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<CancelOutcome, AppError> {
        let order = self.require_order(order_id).await?;
        match order.status {
            OrderStatus::Pending => {
                if !self
                    .store
                    .update_order_status(order_id, OrderStatus::Pending, OrderStatus::Cancelled)
                    .await?
                {
                    return Err(AppError::StateError(format!(
                        "Order '{}' changed state concurrently",
                        order.order_code
                    )));
                }
                self.release_order_inventory(order_id).await?;
                self.store
                    .set_tickets_status(order_id, TicketStatus::Cancelled)
                    .await?;
                info!(order = %order_id, "Order cancelled, inventory released");
                Ok(CancelOutcome {
                    immediate: true,
                    message: "Order cancelled and inventory released".to_string(),
                })
            }
            OrderStatus::Paid => {
                if !self
                    .store
                    .update_order_status(order_id, OrderStatus::Paid, OrderStatus::RefundPending)
                    .await?
                {
                    return Err(AppError::StateError(format!(
                        "Order '{}' changed state concurrently",
                        order.order_code
                    )));
                }
                info!(order = %order_id, "Refund requested");
                Ok(CancelOutcome {
                    immediate: false,
                    message: "Refund requested; inventory is released once the refund completes"
                        .to_string(),
                })
            }
            other => Err(AppError::StateError(format!(
                "Order '{}' cannot be cancelled from {:?}",
                order.order_code, other
            ))),
        }
    }

    /// Payment-confirmation callback. The post-payment notification is
    /// fire-and-forget: it happens after the transition committed and its
    /// failure can never undo the sale.
    pub async fn mark_paid(&self, order_id: Uuid) -> Result<Order, AppError> {
        let order = self.require_order(order_id).await?;
        if !self
            .store
            .update_order_status(order_id, OrderStatus::Pending, OrderStatus::Paid)
            .await?
        {
            return Err(AppError::StateError(format!(
                "Order '{}' is not awaiting payment",
                order.order_code
            )));
        }
        info!(order = %order_id, "Order paid; notification dispatch queued");
        self.require_order(order_id).await
    }

    /// Event-day closure: PAID -> COMPLETED.
    pub async fn complete_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        let order = self.require_order(order_id).await?;
        if !self
            .store
            .update_order_status(order_id, OrderStatus::Paid, OrderStatus::Completed)
            .await?
        {
            return Err(AppError::StateError(format!(
                "Order '{}' is not in a completable state",
                order.order_code
            )));
        }
        self.require_order(order_id).await
    }

    /// Refund-workflow completion: REFUND_PENDING -> REFUNDED, and only
    /// now does the inventory go back on sale.
    pub async fn complete_refund(&self, order_id: Uuid) -> Result<Order, AppError> {
        let order = self.require_order(order_id).await?;
        if !self
            .store
            .update_order_status(order_id, OrderStatus::RefundPending, OrderStatus::Refunded)
            .await?
        {
            return Err(AppError::StateError(format!(
                "Order '{}' has no pending refund",
                order.order_code
            )));
        }
        self.release_order_inventory(order_id).await?;
        self.store
            .set_tickets_status(order_id, TicketStatus::Refunded)
            .await?;
        info!(order = %order_id, "Refund completed, inventory released");
        self.require_order(order_id).await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<(Order, Vec<Ticket>), AppError> {
        let order = self.require_order(order_id).await?;
        let tickets = self.store.order_tickets(order_id).await?;
        Ok((order, tickets))
    }

    async fn require_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order '{order_id}' was not found")))
    }

    fn new_ticket(
        &self,
        order_id: Uuid,
        ticket_type_id: Uuid,
        seat_id: Option<Uuid>,
        price: Decimal,
    ) -> Ticket {
        let id = Uuid::new_v4();
        Ticket {
            id,
            order_id,
            ticket_type_id,
            seat_id,
            ticket_code: Ticket::code_for(id),
            price,
            status: TicketStatus::Active,
            checked_in_at: None,
            created_at: Utc::now(),
        }
    }

    /// Returns booked seats and quantity counters of a finished order to
    /// availability, derived from its tickets.
    async fn release_order_inventory(&self, order_id: Uuid) -> Result<(), AppError> {
        let tickets = self.store.order_tickets(order_id).await?;

        let seat_ids: Vec<Uuid> = tickets.iter().filter_map(|t| t.seat_id).collect();
        if !seat_ids.is_empty() {
            self.store.unbook_seats(&seat_ids).await?;
        }

        let mut seatless: HashMap<Uuid, i32> = HashMap::new();
        for ticket in tickets.iter().filter(|t| t.seat_id.is_none()) {
            *seatless.entry(ticket.ticket_type_id).or_insert(0) += 1;
        }
        for (type_id, qty) in seatless {
            self.store.release_quantity(type_id, qty).await?;
        }
        Ok(())
    }

    /// Undo a partially-applied checkout. Confirmed seats go back to
    /// LOCKED under their original hold, never to AVAILABLE: the hold rows
    /// stay ACTIVE, so releasing the seat would let a rival lock it and
    /// leave two live claims on one seat. Promoted hold rows are
    /// reinstated to ACTIVE first; a hold that expired mid-flight has lost
    /// its claim and its seats are freed instead. Compensation failures
    /// are logged rather than propagated: the caller already has a primary
    /// error and the sweep reclaims anything left behind.
    async fn compensate(
        &self,
        order_id: Uuid,
        confirmed: &[&HeldGroup],
        promoted: &[Uuid],
        reserved: &[(Uuid, i32)],
    ) {
        for group in confirmed {
            if promoted.contains(&group.hold_id) {
                if let Err(err) = self.store.claim_reinstate(group.hold_id).await {
                    warn!(hold = %group.hold_id, error = %err, "Failed to reinstate hold during compensation");
                }
            }
            let still_active = match self.store.hold_rows(group.hold_id).await {
                Ok(rows) => rows.iter().any(|row| row.state == HoldState::Active),
                // Unknown state: keep the buyer's claim on the seats.
                Err(_) => true,
            };
            let restore = if still_active {
                self.store
                    .relock_seats(&group.seat_ids, group.hold_id, group.expires_at)
                    .await
            } else {
                self.store.unbook_seats(&group.seat_ids).await
            };
            if let Err(err) = restore {
                warn!(
                    order = %order_id,
                    hold = %group.hold_id,
                    error = %err,
                    "Failed to restore seats during compensation"
                );
            }
        }
        if let Err(err) = self.store.delete_order(order_id).await {
            warn!(order = %order_id, error = %err, "Failed to remove order during compensation");
        }
        self.rollback_quantities(reserved).await;
    }

    async fn rollback_quantities(&self, reserved: &[(Uuid, i32)]) {
        for &(type_id, qty) in reserved {
            if let Err(err) = self.store.release_quantity(type_id, qty).await {
                warn!(ticket_type = %type_id, error = %err, "Failed to release quantity during compensation");
            }
        }
    }
}

impl<S> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reservations: self.reservations.clone(),
            discounts: Arc::clone(&self.discounts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatStatus;
    use crate::services::discount::{DiscountOutcome, NoDiscount};
    use crate::store::{HoldStore, InventoryStore, MemoryStore};
    use async_trait::async_trait;
    use chrono::Duration;

    struct FlatDiscount(Decimal);

    #[async_trait]
    impl DiscountValidator for FlatDiscount {
        async fn validate_and_calculate(
            &self,
            _code: &str,
            _items: &[PricedLine],
        ) -> DiscountOutcome {
            DiscountOutcome {
                valid: true,
                amount: self.0,
                message: String::new(),
            }
        }
    }

    fn services(
        store: &Arc<MemoryStore>,
        discounts: Arc<dyn DiscountValidator>,
    ) -> (ReservationManager<MemoryStore>, OrderService<MemoryStore>) {
        let reservations = ReservationManager::new(Arc::clone(store), Duration::seconds(300));
        let orders = OrderService::new(Arc::clone(store), reservations.clone(), discounts);
        (reservations, orders)
    }

    fn unseated(ticket_type_id: Uuid, quantity: i32) -> LineItem {
        LineItem {
            ticket_type_id,
            quantity,
            seat_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn unseated_checkout_decrements_availability() {
        let store = Arc::new(MemoryStore::new());
        let tt = store
            .seed_ticket_type(Uuid::new_v4(), Decimal::new(1999, 2), 10, 4)
            .await;
        let (_, orders) = services(&store, Arc::new(NoDiscount));

        let (order, tickets) = orders
            .create_order(Uuid::new_v4(), &[unseated(tt, 3)], &[], None)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Decimal::new(5997, 2));
        assert_eq!(order.final_amount, order.total_amount);
        assert_eq!(tickets.len(), 3);
        assert_eq!(store.available_quantity(tt).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn max_per_order_is_enforced() {
        let store = Arc::new(MemoryStore::new());
        let tt = store
            .seed_ticket_type(Uuid::new_v4(), Decimal::TEN, 100, 4)
            .await;
        let (_, orders) = services(&store, Arc::new(NoDiscount));

        let err = orders
            .create_order(Uuid::new_v4(), &[unseated(tt, 5)], &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(store.available_quantity(tt).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn discount_never_goes_below_zero() {
        let store = Arc::new(MemoryStore::new());
        let tt = store
            .seed_ticket_type(Uuid::new_v4(), Decimal::TEN, 10, 4)
            .await;
        let (_, orders) = services(&store, Arc::new(FlatDiscount(Decimal::new(100_000, 2))));

        let (order, _) = orders
            .create_order(Uuid::new_v4(), &[unseated(tt, 2)], &[], Some("WELCOME"))
            .await
            .unwrap();
        assert_eq!(order.total_amount, Decimal::new(20, 0));
        assert_eq!(order.discount_amount, Decimal::new(20, 0));
        assert_eq!(order.final_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn unknown_discount_code_rejects_the_order() {
        let store = Arc::new(MemoryStore::new());
        let tt = store
            .seed_ticket_type(Uuid::new_v4(), Decimal::TEN, 10, 4)
            .await;
        let (_, orders) = services(&store, Arc::new(NoDiscount));

        let err = orders
            .create_order(Uuid::new_v4(), &[unseated(tt, 1)], &[], Some("NOPE"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(store.available_quantity(tt).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn seated_checkout_books_seats_and_promotes_the_hold() {
        let store = Arc::new(MemoryStore::new());
        let event_id = Uuid::new_v4();
        let tt = store
            .seed_ticket_type(event_id, Decimal::new(4500, 2), 50, 6)
            .await;
        let a = store.seed_seat(tt, "A", 1).await;
        let b = store.seed_seat(tt, "A", 2).await;
        let (reservations, orders) = services(&store, Arc::new(NoDiscount));

        let user = Uuid::new_v4();
        let hold = reservations
            .create_hold(user, event_id, &[a, b], None)
            .await
            .unwrap();

        let item = LineItem {
            ticket_type_id: tt,
            quantity: 2,
            seat_ids: vec![a, b],
        };
        let (order, tickets) = orders
            .create_order(user, &[item], &[hold.id], None)
            .await
            .unwrap();

        assert_eq!(order.final_amount, Decimal::new(9000, 2));
        assert_eq!(tickets.len(), 2);
        assert_eq!(store.seat(a).await.unwrap().status, SeatStatus::Booked);
        assert_eq!(store.seat(b).await.unwrap().status, SeatStatus::Booked);
        assert_eq!(
            store.hold_rows(hold.id).await.unwrap()[0].state,
            HoldState::Promoted
        );
    }

    #[tokio::test]
    async fn a_seat_listed_under_the_wrong_ticket_type_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let event_id = Uuid::new_v4();
        let vip = store
            .seed_ticket_type(event_id, Decimal::new(50_000, 2), 10, 4)
            .await;
        let ga = store.seed_ticket_type(event_id, Decimal::new(1, 2), 100, 4).await;
        let seat = store.seed_seat(vip, "A", 1).await;
        let (reservations, orders) = services(&store, Arc::new(NoDiscount));

        let user = Uuid::new_v4();
        let hold = reservations
            .create_hold(user, event_id, &[seat], None)
            .await
            .unwrap();

        // The VIP seat listed under the cheap type's line item must not
        // be sellable at the cheap price.
        let item = LineItem {
            ticket_type_id: ga,
            quantity: 1,
            seat_ids: vec![seat],
        };
        let err = orders
            .create_order(user, &[item], &[hold.id], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        assert_eq!(store.seat(seat).await.unwrap().status, SeatStatus::Locked);
        assert_eq!(
            store.hold_rows(hold.id).await.unwrap()[0].state,
            HoldState::Active
        );
        assert_eq!(store.available_quantity(ga).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn seats_without_a_hold_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let event_id = Uuid::new_v4();
        let tt = store.seed_ticket_type(event_id, Decimal::TEN, 50, 6).await;
        let a = store.seed_seat(tt, "A", 1).await;
        let (_, orders) = services(&store, Arc::new(NoDiscount));

        let item = LineItem {
            ticket_type_id: tt,
            quantity: 1,
            seat_ids: vec![a],
        };
        let err = orders
            .create_order(Uuid::new_v4(), &[item], &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn cancelling_a_pending_order_releases_inventory() {
        let store = Arc::new(MemoryStore::new());
        let event_id = Uuid::new_v4();
        let tt = store.seed_ticket_type(event_id, Decimal::TEN, 10, 6).await;
        let a = store.seed_seat(tt, "A", 1).await;
        let (reservations, orders) = services(&store, Arc::new(NoDiscount));

        let user = Uuid::new_v4();
        let hold = reservations
            .create_hold(user, event_id, &[a], None)
            .await
            .unwrap();
        let seated = LineItem {
            ticket_type_id: tt,
            quantity: 1,
            seat_ids: vec![a],
        };
        let (order, _) = orders
            .create_order(user, &[seated, unseated(tt, 2)], &[hold.id], None)
            .await
            .unwrap();

        let outcome = orders.cancel_order(order.id).await.unwrap();
        assert!(outcome.immediate);
        assert_eq!(store.seat(a).await.unwrap().status, SeatStatus::Available);
        assert_eq!(store.available_quantity(tt).await.unwrap(), 10);

        let (order, tickets) = orders.get_order(order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Cancelled));
    }

    #[tokio::test]
    async fn cancelling_a_paid_order_defers_inventory_release() {
        let store = Arc::new(MemoryStore::new());
        let tt = store
            .seed_ticket_type(Uuid::new_v4(), Decimal::TEN, 10, 6)
            .await;
        let (_, orders) = services(&store, Arc::new(NoDiscount));

        let (order, _) = orders
            .create_order(Uuid::new_v4(), &[unseated(tt, 2)], &[], None)
            .await
            .unwrap();
        orders.mark_paid(order.id).await.unwrap();

        let outcome = orders.cancel_order(order.id).await.unwrap();
        assert!(!outcome.immediate);
        // Inventory is NOT back on sale while the refund is pending.
        assert_eq!(store.available_quantity(tt).await.unwrap(), 8);

        let refunded = orders.complete_refund(order.id).await.unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);
        assert_eq!(store.available_quantity(tt).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn paid_orders_can_complete() {
        let store = Arc::new(MemoryStore::new());
        let tt = store
            .seed_ticket_type(Uuid::new_v4(), Decimal::TEN, 10, 6)
            .await;
        let (_, orders) = services(&store, Arc::new(NoDiscount));

        let (order, _) = orders
            .create_order(Uuid::new_v4(), &[unseated(tt, 1)], &[], None)
            .await
            .unwrap();

        // Completion requires payment first.
        let err = orders.complete_order(order.id).await.unwrap_err();
        assert!(matches!(err, AppError::StateError(_)));

        orders.mark_paid(order.id).await.unwrap();
        let done = orders.complete_order(order.id).await.unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
    }
}
