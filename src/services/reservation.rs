use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::Hold;
use crate::store::{HoldStore, InventoryStore, LockOutcome};
use crate::utils::AppError;

/// Grants time-boxed seat holds, expires them, and promotes them into
/// sales. Seat-level arbitration is entirely the inventory store's
/// all-or-nothing lock; this manager never tie-breaks on its own.
pub struct ReservationManager<S> {
    store: Arc<S>,
    default_ttl: Duration,
}

impl<S> ReservationManager<S>
where
    S: InventoryStore + HoldStore,
{
    pub fn new(store: Arc<S>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// Attempts to lock every requested seat for a new hold. On denial no
    /// seat is taken and the conflicting ids are reported to the caller;
    /// there is no retry or backoff here.
    ///
    /// The hold id doubles as the seat lock owner, so a later confirm can
    /// only book seats this exact hold was granted.
    pub async fn create_hold(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        seat_ids: &[Uuid],
        ttl: Option<Duration>,
    ) -> Result<Hold, AppError> {
        if seat_ids.is_empty() {
            return Err(AppError::ValidationError(
                "A hold must request at least one seat".to_string(),
            ));
        }
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl <= Duration::zero() {
            return Err(AppError::ValidationError(
                "Hold TTL must be positive".to_string(),
            ));
        }

        let hold_id = Uuid::new_v4();
        match self.store.try_lock_seats(seat_ids, hold_id, ttl).await? {
            LockOutcome::Denied { unavailable } => Err(AppError::conflict(
                "Some of the requested seats are unavailable",
                unavailable,
            )),
            LockOutcome::Granted => {
                let mut ids = seat_ids.to_vec();
                ids.sort_unstable();
                ids.dedup();

                let now = Utc::now();
                let hold = Hold {
                    id: hold_id,
                    user_id,
                    event_id,
                    seat_ids: ids,
                    reserved_at: now,
                    expires_at: now + ttl,
                };

                if let Err(err) = self.store.insert_hold(&hold).await {
                    // Locked seats without a hold row would never expire.
                    self.store.release_seats(&hold.seat_ids).await?;
                    return Err(err);
                }

                info!(
                    hold = %hold.id,
                    user = %user_id,
                    seats = hold.seat_ids.len(),
                    expires_at = %hold.expires_at,
                    "Hold granted"
                );
                Ok(hold)
            }
        }
    }

    /// Explicit cancel. Idempotent: releasing a hold that already reached
    /// a terminal state does nothing.
    pub async fn release_hold(&self, hold_id: Uuid, reason: &str) -> Result<(), AppError> {
        let seat_ids = self.store.claim_release(hold_id).await?;
        if seat_ids.is_empty() {
            return Ok(());
        }
        self.store.release_seats(&seat_ids).await?;
        info!(hold = %hold_id, seats = seat_ids.len(), reason, "Hold released");
        Ok(())
    }

    /// Marks the hold PROMOTED and returns its seat ids. The caller is
    /// responsible for having confirmed the seats as part of the same
    /// logical unit of work.
    pub async fn promote_hold(&self, hold_id: Uuid, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let seat_ids = self
            .store
            .claim_promote(hold_id, user_id, Utc::now())
            .await?;
        if seat_ids.is_empty() {
            if self.store.hold_rows(hold_id).await?.is_empty() {
                return Err(AppError::NotFound(format!(
                    "Hold '{hold_id}' was not found"
                )));
            }
            return Err(AppError::StateError(format!(
                "Hold '{hold_id}' is not active for this user or has expired"
            )));
        }
        Ok(seat_ids)
    }

    /// Expires stale holds and returns the seats they covered to
    /// availability. The conditional state claim makes this safe to run
    /// from any number of scheduler instances at once: a hold expired by
    /// one sweeper is invisible to the others.
    pub async fn sweep_expired(&self) -> Result<usize, AppError> {
        let claimed = self.store.claim_expired(Utc::now()).await?;
        if claimed.is_empty() {
            return Ok(0);
        }

        let seat_ids: Vec<Uuid> = claimed.iter().map(|row| row.seat_id).collect();
        self.store.release_seats(&seat_ids).await?;

        let holds: HashSet<Uuid> = claimed.iter().map(|row| row.hold_id).collect();
        warn!(
            holds = holds.len(),
            seats = seat_ids.len(),
            "Expired stale holds"
        );
        Ok(holds.len())
    }
}

// Manual impl: a derived Clone would require S: Clone.
impl<S> Clone for ReservationManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            default_ttl: self.default_ttl,
        }
    }
}
