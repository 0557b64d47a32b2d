use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgQueryResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Hold, Order, OrderStatus, Seat, SeatHoldRow, SeatStatus, Ticket, TicketStatus, TicketType,
};
use crate::store::{
    HoldStore, InventoryStore, LockOutcome, OrderStore, StoreResult,
};
use crate::utils::AppError;

/// Per-transaction lock wait budget. A caller that cannot take its row
/// locks within this window gets a retryable error, not a success.
const LOCK_TIMEOUT: &str = "SET LOCAL lock_timeout = '3s'";

/// Postgres `lock_not_available`, raised when `lock_timeout` fires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Postgres `deadlock_detected`; one of the tangled transactions is
/// aborted and can simply be retried.
const DEADLOCK_DETECTED: &str = "40P01";

/// Postgres `serialization_failure`, equally retryable.
const SERIALIZATION_FAILURE: &str = "40001";

const SEAT_COLUMNS: &str = "id, ticket_type_id, row_label, seat_number, area, status, \
     held_by, hold_expires_at, active, created_at, updated_at";

const HOLD_COLUMNS: &str =
    "id, hold_id, seat_id, user_id, event_id, reserved_at, expires_at, state";

const ORDER_COLUMNS: &str = "id, order_code, user_id, event_id, total_amount, \
     discount_amount, final_amount, status, created_at, updated_at";

const TICKET_COLUMNS: &str = "id, order_id, ticket_type_id, seat_id, ticket_code, \
     price, status, checked_in_at, created_at";

/// Durable store backed by Postgres. Atomicity comes from row locks and
/// single-statement conditional updates, never from in-process locks, so
/// any number of server instances can share one database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Lock-wait timeouts, deadlocks and serialization aborts surface as
/// retryable, everything else as a database error.
fn map_db_err(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
            AppError::Transient("timed out waiting for seat locks".to_string())
        }
        sqlx::Error::Database(db)
            if matches!(
                db.code().as_deref(),
                Some(DEADLOCK_DETECTED) | Some(SERIALIZATION_FAILURE)
            ) =>
        {
            AppError::Transient(
                "the database aborted the operation to resolve a conflict".to_string(),
            )
        }
        sqlx::Error::PoolTimedOut => {
            AppError::Transient("timed out waiting for a database connection".to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

/// Deduplicated, ascending seat ids. Every multi-seat statement uses this
/// ordering so concurrent callers take row locks in the same sequence and
/// cannot deadlock each other.
fn canonical_ids(seat_ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids = seat_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn try_lock_seats(
        &self,
        seat_ids: &[Uuid],
        hold_owner: Uuid,
        ttl: Duration,
    ) -> StoreResult<LockOutcome> {
        let ids = canonical_ids(seat_ids);
        let expires_at = Utc::now() + ttl;

        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        sqlx::query(LOCK_TIMEOUT)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        let rows: Vec<(Uuid, SeatStatus, bool)> = sqlx::query_as(
            "SELECT id, status, active FROM seats WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let mut unavailable: Vec<Uuid> = Vec::new();
        for (id, status, active) in &rows {
            if !*active || !status.is_grantable() {
                unavailable.push(*id);
            }
        }
        // Ids with no seat row are unavailable too.
        for id in &ids {
            if !rows.iter().any(|(row_id, _, _)| row_id == id) {
                unavailable.push(*id);
            }
        }

        if !unavailable.is_empty() {
            tx.rollback().await.map_err(map_db_err)?;
            unavailable.sort_unstable();
            return Ok(LockOutcome::Denied { unavailable });
        }

        sqlx::query(
            "UPDATE seats SET status = 'LOCKED', held_by = $2, hold_expires_at = $3, \
             updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(&ids)
        .bind(hold_owner)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        Ok(LockOutcome::Granted)
    }

    async fn release_seats(&self, seat_ids: &[Uuid]) -> StoreResult<()> {
        let ids = canonical_ids(seat_ids);
        sqlx::query(
            "UPDATE seats SET status = 'AVAILABLE', held_by = NULL, hold_expires_at = NULL, \
             updated_at = NOW() WHERE id = ANY($1) AND status IN ('LOCKED', 'RESERVED')",
        )
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn unbook_seats(&self, seat_ids: &[Uuid]) -> StoreResult<()> {
        let ids = canonical_ids(seat_ids);
        sqlx::query(
            "UPDATE seats SET status = 'AVAILABLE', held_by = NULL, hold_expires_at = NULL, \
             updated_at = NOW() WHERE id = ANY($1) AND status = 'BOOKED'",
        )
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn relock_seats(
        &self,
        seat_ids: &[Uuid],
        owner: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let ids = canonical_ids(seat_ids);
        sqlx::query(
            "UPDATE seats SET status = 'LOCKED', held_by = $2, hold_expires_at = $3, \
             updated_at = NOW() WHERE id = ANY($1) AND status = 'BOOKED'",
        )
        .bind(&ids)
        .bind(owner)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn confirm_seats(&self, seat_ids: &[Uuid], owner: Uuid) -> StoreResult<bool> {
        let ids = canonical_ids(seat_ids);

        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        sqlx::query(LOCK_TIMEOUT)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        let result: PgQueryResult = sqlx::query(
            "UPDATE seats SET status = 'BOOKED', held_by = NULL, hold_expires_at = NULL, \
             updated_at = NOW() \
             WHERE id = ANY($1) AND status IN ('LOCKED', 'RESERVED') AND held_by = $2",
        )
        .bind(&ids)
        .bind(owner)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() as usize != ids.len() {
            // Some seat was not confirmable; undo the ones that were.
            tx.rollback().await.map_err(map_db_err)?;
            return Ok(false);
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(true)
    }

    async fn reserve_quantity(&self, ticket_type_id: Uuid, qty: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE ticket_types SET sold_quantity = sold_quantity + $2, updated_at = NOW() \
             WHERE id = $1 AND active AND sold_quantity + $2 <= quantity",
        )
        .bind(ticket_type_id)
        .bind(qty)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_quantity(&self, ticket_type_id: Uuid, qty: i32) -> StoreResult<()> {
        sqlx::query(
            "UPDATE ticket_types SET sold_quantity = GREATEST(sold_quantity - $2, 0), \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(ticket_type_id)
        .bind(qty)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        let row = sqlx::query_as::<_, TicketType>(
            "SELECT id, event_id, name, price, quantity, sold_quantity, max_per_order, \
             active, created_at, updated_at FROM ticket_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row)
    }

    async fn seats(&self, seat_ids: &[Uuid]) -> StoreResult<Vec<Seat>> {
        let ids = canonical_ids(seat_ids);
        let query = format!("SELECT {SEAT_COLUMNS} FROM seats WHERE id = ANY($1) ORDER BY id");
        let rows = sqlx::query_as::<_, Seat>(&query)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(rows)
    }

    async fn available_quantity(&self, ticket_type_id: Uuid) -> StoreResult<i32> {
        let available: Option<i32> = sqlx::query_scalar(
            "SELECT quantity - sold_quantity FROM ticket_types WHERE id = $1",
        )
        .bind(ticket_type_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        available.ok_or_else(|| {
            AppError::NotFound(format!("Ticket type '{ticket_type_id}' was not found"))
        })
    }
}

#[async_trait]
impl HoldStore for PgStore {
    async fn insert_hold(&self, hold: &Hold) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;
        for seat_id in &hold.seat_ids {
            sqlx::query(
                "INSERT INTO seat_holds \
                 (id, hold_id, seat_id, user_id, event_id, reserved_at, expires_at, state) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, 'ACTIVE')",
            )
            .bind(Uuid::new_v4())
            .bind(hold.id)
            .bind(seat_id)
            .bind(hold.user_id)
            .bind(hold.event_id)
            .bind(hold.reserved_at)
            .bind(hold.expires_at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        }
        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn hold_rows(&self, hold_id: Uuid) -> StoreResult<Vec<SeatHoldRow>> {
        let query =
            format!("SELECT {HOLD_COLUMNS} FROM seat_holds WHERE hold_id = $1 ORDER BY seat_id");
        let rows = sqlx::query_as::<_, SeatHoldRow>(&query)
            .bind(hold_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(rows)
    }

    async fn claim_promote(
        &self,
        hold_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>> {
        let seat_ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE seat_holds SET state = 'PROMOTED' \
             WHERE hold_id = $1 AND user_id = $2 AND state = 'ACTIVE' AND expires_at > $3 \
             RETURNING seat_id",
        )
        .bind(hold_id)
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(seat_ids)
    }

    async fn claim_release(&self, hold_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let seat_ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE seat_holds SET state = 'RELEASED' \
             WHERE hold_id = $1 AND state = 'ACTIVE' RETURNING seat_id",
        )
        .bind(hold_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(seat_ids)
    }

    async fn claim_reinstate(&self, hold_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let seat_ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE seat_holds SET state = 'ACTIVE' \
             WHERE hold_id = $1 AND state = 'PROMOTED' RETURNING seat_id",
        )
        .bind(hold_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(seat_ids)
    }

    async fn claim_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<SeatHoldRow>> {
        let query = format!(
            "UPDATE seat_holds SET state = 'EXPIRED' \
             WHERE state = 'ACTIVE' AND expires_at < $1 RETURNING {HOLD_COLUMNS}"
        );
        let rows = sqlx::query_as::<_, SeatHoldRow>(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(rows)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order, tickets: &[Ticket]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let insert_order = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        sqlx::query(&insert_order)
            .bind(order.id)
            .bind(&order.order_code)
            .bind(order.user_id)
            .bind(order.event_id)
            .bind(order.total_amount)
            .bind(order.discount_amount)
            .bind(order.final_amount)
            .bind(order.status)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        let insert_ticket = format!(
            "INSERT INTO tickets ({TICKET_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        );
        for ticket in tickets {
            sqlx::query(&insert_ticket)
                .bind(ticket.id)
                .bind(ticket.order_id)
                .bind(ticket.ticket_type_id)
                .bind(ticket.seat_id)
                .bind(&ticket.ticket_code)
                .bind(ticket.price)
                .bind(ticket.status)
                .bind(ticket.checked_in_at)
                .bind(ticket.created_at)
                .execute(&mut *tx)
                .await
                .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(order)
    }

    async fn order_tickets(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let query = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE order_id = $1 ORDER BY created_at"
        );
        let tickets = sqlx::query_as::<_, Ticket>(&query)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(tickets)
    }

    async fn delete_order(&self, order_id: Uuid) -> StoreResult<()> {
        // Tickets go with it via ON DELETE CASCADE.
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(order_id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_tickets_status(&self, order_id: Uuid, status: TicketStatus) -> StoreResult<()> {
        sqlx::query("UPDATE tickets SET status = $2 WHERE order_id = $1")
            .bind(order_id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}
