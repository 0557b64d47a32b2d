//! End-to-end booking properties, run against the in-memory store. The
//! Postgres store implements the same traits with the same per-operation
//! atomicity contract, so these exercise the behavior both must provide.

use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use boxoffice_server::models::{HoldState, OrderStatus, SeatStatus};
use boxoffice_server::services::{LineItem, NoDiscount, OrderService, ReservationManager};
use boxoffice_server::store::{HoldStore, InventoryStore, MemoryStore};
use boxoffice_server::utils::AppError;

fn services(
    store: &Arc<MemoryStore>,
) -> (ReservationManager<MemoryStore>, OrderService<MemoryStore>) {
    let reservations = ReservationManager::new(Arc::clone(store), Duration::seconds(300));
    let orders = OrderService::new(
        Arc::clone(store),
        reservations.clone(),
        Arc::new(NoDiscount),
    );
    (reservations, orders)
}

fn quantity_item(ticket_type_id: Uuid, quantity: i32) -> LineItem {
    LineItem {
        ticket_type_id,
        quantity,
        seat_ids: Vec::new(),
    }
}

async fn jitter() {
    let micros = rand::thread_rng().gen_range(0..500);
    tokio::time::sleep(std::time::Duration::from_micros(micros)).await;
}

#[tokio::test]
async fn concurrent_quantity_reservations_never_oversell() {
    let store = Arc::new(MemoryStore::new());
    let capacity = 5;
    let tt = store
        .seed_ticket_type(Uuid::new_v4(), Decimal::TEN, capacity, 1)
        .await;
    let (_, orders) = services(&store);

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let orders = orders.clone();
        tasks.push(tokio::spawn(async move {
            jitter().await;
            orders
                .create_order(Uuid::new_v4(), &[quantity_item(tt, 1)], &[], None)
                .await
        }));
    }

    let mut granted = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(granted, capacity);
    assert_eq!(conflicts, 20 - capacity);
    assert_eq!(store.available_quantity(tt).await.unwrap(), 0);
}

#[tokio::test]
async fn two_buyers_fit_a_pair_and_the_third_conflicts() {
    // TicketType with quantity=2: two single-ticket orders succeed, the
    // third gets a conflict, availability reads zero.
    let store = Arc::new(MemoryStore::new());
    let tt = store
        .seed_ticket_type(Uuid::new_v4(), Decimal::TEN, 2, 2)
        .await;
    let (_, orders) = services(&store);

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let orders = orders.clone();
        tasks.push(tokio::spawn(async move {
            jitter().await;
            orders
                .create_order(Uuid::new_v4(), &[quantity_item(tt, 1)], &[], None)
                .await
        }));
    }

    let results: Vec<_> = futures_join(tasks).await;
    let granted = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict { .. })))
        .count();
    assert_eq!(granted, 2);
    assert_eq!(conflicts, 1);
    assert_eq!(store.available_quantity(tt).await.unwrap(), 0);
}

async fn futures_join<T: Send + 'static>(
    tasks: Vec<tokio::task::JoinHandle<T>>,
) -> Vec<T> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(task.await.unwrap());
    }
    results
}

#[tokio::test]
async fn a_contested_seat_is_granted_to_exactly_one_hold() {
    let store = Arc::new(MemoryStore::new());
    let event_id = Uuid::new_v4();
    let tt = store.seed_ticket_type(event_id, Decimal::TEN, 10, 4).await;
    let seat = store.seed_seat(tt, "A", 1).await;
    let (reservations, _) = services(&store);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let reservations = reservations.clone();
        tasks.push(tokio::spawn(async move {
            jitter().await;
            reservations
                .create_hold(Uuid::new_v4(), event_id, &[seat], None)
                .await
        }));
    }

    let results = futures_join(tasks).await;
    let granted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(granted, 1);
    for result in &results {
        if let Err(AppError::Conflict { seat_ids, .. }) = result {
            assert_eq!(seat_ids, &vec![seat]);
        }
    }
    assert_eq!(store.seat(seat).await.unwrap().status, SeatStatus::Locked);
}

#[tokio::test]
async fn expired_hold_frees_the_seat_after_a_sweep() {
    let store = Arc::new(MemoryStore::new());
    let event_id = Uuid::new_v4();
    let tt = store.seed_ticket_type(event_id, Decimal::TEN, 10, 4).await;
    let seat = store.seed_seat(tt, "A", 1).await;
    let (reservations, _) = services(&store);

    let hold = reservations
        .create_hold(Uuid::new_v4(), event_id, &[seat], Some(Duration::seconds(1)))
        .await
        .unwrap();
    assert_eq!(store.seat(seat).await.unwrap().status, SeatStatus::Locked);

    // Not yet expired: the sweep leaves it alone.
    assert_eq!(reservations.sweep_expired().await.unwrap(), 0);

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    assert_eq!(reservations.sweep_expired().await.unwrap(), 1);
    assert_eq!(
        store.seat(seat).await.unwrap().status,
        SeatStatus::Available
    );

    // A new buyer can take the seat again.
    let rebooked = reservations
        .create_hold(Uuid::new_v4(), event_id, &[seat], None)
        .await;
    assert!(rebooked.is_ok());
    assert_eq!(
        store.hold_rows(hold.id).await.unwrap()[0].state,
        HoldState::Expired
    );
}

#[tokio::test]
async fn failed_seat_confirmation_rolls_the_whole_order_back() {
    let store = Arc::new(MemoryStore::new());
    let event_id = Uuid::new_v4();
    let tt = store
        .seed_ticket_type(event_id, Decimal::new(3000, 2), 50, 6)
        .await;
    let a = store.seed_seat(tt, "A", 1).await;
    let b = store.seed_seat(tt, "A", 2).await;
    let c = store.seed_seat(tt, "A", 3).await;
    let (reservations, orders) = services(&store);

    let user = Uuid::new_v4();
    let hold = reservations
        .create_hold(user, event_id, &[a, b, c], None)
        .await
        .unwrap();

    // Simulated fault: seat C slips out from under the hold before the
    // order confirms it.
    store.force_seat(c, SeatStatus::Available, None).await;

    let item = LineItem {
        ticket_type_id: tt,
        quantity: 3,
        seat_ids: vec![a, b, c],
    };
    let err = orders
        .create_order(user, &[item], &[hold.id], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    // Seats A and B are not left BOOKED and the hold is still ACTIVE, so
    // the buyer can retry before the TTL runs out.
    assert_eq!(store.seat(a).await.unwrap().status, SeatStatus::Locked);
    assert_eq!(store.seat(b).await.unwrap().status, SeatStatus::Locked);
    for row in store.hold_rows(hold.id).await.unwrap() {
        assert_eq!(row.state, HoldState::Active);
    }
}

#[tokio::test]
async fn a_failed_multi_hold_checkout_keeps_the_surviving_hold_locked() {
    let store = Arc::new(MemoryStore::new());
    let event_id = Uuid::new_v4();
    let tt = store
        .seed_ticket_type(event_id, Decimal::new(4000, 2), 50, 6)
        .await;
    let a = store.seed_seat(tt, "A", 1).await;
    let b = store.seed_seat(tt, "A", 2).await;
    let (reservations, orders) = services(&store);

    let user = Uuid::new_v4();
    let hold_a = reservations
        .create_hold(user, event_id, &[a], None)
        .await
        .unwrap();
    let hold_b = reservations
        .create_hold(user, event_id, &[b], None)
        .await
        .unwrap();

    // Seat B slips away before the order can confirm it; seat A was
    // already confirmed by then and must be restored to its hold.
    store.force_seat(b, SeatStatus::Available, None).await;

    let item = LineItem {
        ticket_type_id: tt,
        quantity: 2,
        seat_ids: vec![a, b],
    };
    let err = orders
        .create_order(user, &[item], &[hold_a.id, hold_b.id], None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    // Seat A is back under hold_a's lock, not released to the floor.
    let seat_a = store.seat(a).await.unwrap();
    assert_eq!(seat_a.status, SeatStatus::Locked);
    assert_eq!(seat_a.held_by, Some(hold_a.id));
    for row in store.hold_rows(hold_a.id).await.unwrap() {
        assert_eq!(row.state, HoldState::Active);
    }

    // A rival cannot take the seat while the hold is still live.
    let rival = reservations
        .create_hold(Uuid::new_v4(), event_id, &[a], None)
        .await;
    assert!(matches!(rival, Err(AppError::Conflict { .. })));

    // The buyer's retry with the surviving hold succeeds.
    let retry = LineItem {
        ticket_type_id: tt,
        quantity: 1,
        seat_ids: vec![a],
    };
    let (order, _) = orders
        .create_order(user, &[retry], &[hold_a.id], None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(store.seat(a).await.unwrap().status, SeatStatus::Booked);
}

#[tokio::test]
async fn full_booking_flow_from_hold_to_completion() {
    let store = Arc::new(MemoryStore::new());
    let event_id = Uuid::new_v4();
    let seated_tt = store
        .seed_ticket_type(event_id, Decimal::new(7500, 2), 100, 8)
        .await;
    let ga_tt = store
        .seed_ticket_type(event_id, Decimal::new(2500, 2), 200, 8)
        .await;
    let a = store.seed_seat(seated_tt, "B", 11).await;
    let b = store.seed_seat(seated_tt, "B", 12).await;
    let (reservations, orders) = services(&store);

    let user = Uuid::new_v4();
    let hold = reservations
        .create_hold(user, event_id, &[a, b], None)
        .await
        .unwrap();

    let items = vec![
        LineItem {
            ticket_type_id: seated_tt,
            quantity: 2,
            seat_ids: vec![a, b],
        },
        quantity_item(ga_tt, 2),
    ];
    let (order, tickets) = orders
        .create_order(user, &items, &[hold.id], None)
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Decimal::new(20000, 2));
    assert_eq!(tickets.len(), 4);
    assert_eq!(store.seat(a).await.unwrap().status, SeatStatus::Booked);
    assert_eq!(store.available_quantity(ga_tt).await.unwrap(), 198);

    let paid = orders.mark_paid(order.id).await.unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);

    let done = orders.complete_order(order.id).await.unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
}
