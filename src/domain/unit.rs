use crate::domain::{BookingId, UnitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Available,
    Locked,
    Booked,
}

/// Outcome of an attempt to take the exclusive reservation lock on a unit.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LockOutcome {
    Acquired,
    AlreadyLocked { by: BookingId },
}

/// A rentable physical unit.
///
/// The lock relation is the one piece of shared mutable state in the core:
/// `locked_by` is set if and only if `status == Locked`, and at most one
/// booking holds it at a time. The entity methods keep the first invariant;
/// the store's conditional write keeps the second. `booked_by` records which
/// booking finalized the unit and is set if and only if `status == Booked`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub status: UnitStatus,
    pub locked_by: Option<BookingId>,
    pub locked_at: Option<DateTime<Utc>>,
    pub booked_by: Option<BookingId>,
}

impl Unit {
    pub fn new(id: UnitId) -> Self {
        Self {
            id,
            status: UnitStatus::Available,
            locked_by: None,
            locked_at: None,
            booked_by: None,
        }
    }

    pub fn is_locked_by(&self, booking: BookingId) -> bool {
        self.status == UnitStatus::Locked && self.locked_by == Some(booking)
    }

    /// Takes or refreshes the lock for `booking`. The caller must have
    /// verified exclusivity; this only records the result.
    pub fn lock(&mut self, booking: BookingId, at: DateTime<Utc>) {
        self.status = UnitStatus::Locked;
        self.locked_by = Some(booking);
        self.locked_at = Some(at);
    }

    pub fn unlock(&mut self) {
        self.status = UnitStatus::Available;
        self.locked_by = None;
        self.locked_at = None;
    }

    /// Finalizes the reservation. The lock is released; the owning booking
    /// moves to `booked_by` so the occupancy report can still name it.
    pub fn book(&mut self) {
        self.booked_by = self.locked_by.take();
        self.locked_at = None;
        self.status = UnitStatus::Booked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_invariant() {
        let mut unit = Unit::new(1);
        assert_eq!(unit.status, UnitStatus::Available);
        assert!(unit.locked_by.is_none());

        unit.lock(7, Utc::now());
        assert_eq!(unit.status, UnitStatus::Locked);
        assert!(unit.is_locked_by(7));
        assert!(!unit.is_locked_by(8));

        unit.unlock();
        assert_eq!(unit.status, UnitStatus::Available);
        assert!(unit.locked_by.is_none());
        assert!(unit.locked_at.is_none());
    }

    #[test]
    fn test_book_moves_owner_and_releases_lock() {
        let mut unit = Unit::new(1);
        unit.lock(7, Utc::now());
        unit.book();
        assert_eq!(unit.status, UnitStatus::Booked);
        assert_eq!(unit.booked_by, Some(7));
        // The lock relation only ever holds while status is Locked.
        assert!(unit.locked_by.is_none());
        assert!(unit.locked_at.is_none());
        assert!(!unit.is_locked_by(7));
    }
}
