use crate::domain::ports::{UnitStore, UnitStoreRef};
use crate::domain::unit::{LockOutcome, Unit, UnitStatus};
use crate::domain::{BookingId, UnitId};
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Owns the exclusive-reservation state machine for units.
///
/// All lock decisions are delegated to the store's atomic conditional
/// operations; the manager itself never does a read-check-write, so two
/// simultaneous booking attempts for the same unit race inside the store's
/// single compare-and-swap and exactly one wins.
pub struct UnitLockManager {
    units: UnitStoreRef,
}

impl UnitLockManager {
    pub fn new(units: UnitStoreRef) -> Self {
        Self { units }
    }

    pub async fn unit(&self, unit_id: UnitId) -> Result<Option<Unit>> {
        self.units.get(unit_id).await
    }

    /// Tries to take the lock for `booking`. Re-entry by the current holder
    /// is idempotent and merely refreshes `locked_at`.
    pub async fn try_lock(
        &self,
        unit_id: UnitId,
        booking: BookingId,
        at: DateTime<Utc>,
    ) -> Result<LockOutcome> {
        let outcome = self.units.lock_if_free(unit_id, booking, at).await?;
        match outcome {
            LockOutcome::Acquired => {
                debug!(unit_id, booking, "unit lock acquired");
            }
            LockOutcome::AlreadyLocked { by } => {
                debug!(unit_id, booking, held_by = by, "unit lock contended");
            }
        }
        Ok(outcome)
    }

    /// Releases the lock if `booking` holds it; a stale caller is a no-op.
    pub async fn unlock(&self, unit_id: UnitId, booking: BookingId) -> Result<()> {
        self.units.unlock_if_held(unit_id, booking).await
    }

    /// Finalizes the reservation: Locked -> Booked for the holder.
    pub async fn mark_booked(&self, unit_id: UnitId, booking: BookingId) -> Result<()> {
        self.units.mark_booked(unit_id, booking).await
    }

    /// Sweeps locks older than `cutoff` back to Available.
    ///
    /// A failed charge deliberately leaves its unit locked so a `repay`
    /// attempt can resume without a race window; this sweep is the
    /// out-of-band path that reclaims units whose caller never came back.
    /// Booked units are never touched. Returns the units released.
    pub async fn release_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<UnitId>> {
        let mut released = Vec::new();
        for unit in self.units.all().await? {
            if unit.status != UnitStatus::Locked {
                continue;
            }
            let (Some(holder), Some(locked_at)) = (unit.locked_by, unit.locked_at) else {
                continue;
            };
            if locked_at < cutoff {
                self.units.unlock_if_held(unit.id, holder).await?;
                info!(unit_id = unit.id, booking = holder, "expired unit lock released");
                released.push(unit.id);
            }
        }
        Ok(released)
    }
}
