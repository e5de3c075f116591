use crate::domain::unit::{Unit, UnitStatus};
use crate::domain::BookingId;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OccupancyRow {
    unit: u32,
    status: UnitStatus,
    /// The booking holding the lock, or the one that finalized the unit.
    booking: Option<BookingId>,
}

/// Writes the final unit occupancy as CSV.
pub struct OccupancyWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OccupancyWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_units(&mut self, units: Vec<Unit>) -> Result<()> {
        for unit in units {
            self.writer.serialize(OccupancyRow {
                unit: unit.id,
                status: unit.status,
                booking: unit.locked_by.or(unit.booked_by),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
