//! Data types produced by the aggregation pipeline.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Mean availability of one slot in one (hour, day-of-week) bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub hour: u8,
    pub day_of_week: u8,
    pub slot_id: String,
    pub mean_availability: f64,
}

/// One (hour, day-of-week) row of the wide table; `values` follows the
/// table's slot order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub hour: u8,
    pub day_of_week: u8,
    pub values: Vec<f64>,
}

/// Wide-form availability table: one row per observed (hour, day-of-week)
/// bucket, one column per slot.
///
/// A slot with no events in an observed bucket holds `0.0`, so "no data" reads
/// the same as "never free". Consumers that need to tell the two apart have to
/// go back to the long-form [`AggregatedRow`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityTable {
    slots: Vec<String>,
    rows: Vec<TableRow>,
}

impl ProbabilityTable {
    /// Builds a table, sorting rows by (hour, day-of-week).
    ///
    /// # Errors
    ///
    /// Fails when a row is out of range, duplicated, or has the wrong width.
    pub fn new(slots: Vec<String>, mut rows: Vec<TableRow>) -> Result<Self> {
        rows.sort_by_key(|r| (r.hour, r.day_of_week));
        let table = ProbabilityTable { slots, rows };
        table.validate()?;
        Ok(table)
    }

    /// Caller guarantees distinct slots and rows already ordered by
    /// (hour, day-of-week) with one value per slot.
    pub(crate) fn from_sorted(slots: Vec<String>, rows: Vec<TableRow>) -> Self {
        ProbabilityTable { slots, rows }
    }

    /// Checks the invariants a deserialized table may have lost.
    pub fn validate(&self) -> Result<()> {
        for (i, slot) in self.slots.iter().enumerate() {
            if self.slots[..i].contains(slot) {
                bail!("duplicate slot column '{slot}'");
            }
        }

        for (i, row) in self.rows.iter().enumerate() {
            if row.hour > 23 || row.day_of_week > 6 {
                bail!(
                    "row out of range: hour={} day_of_week={}",
                    row.hour,
                    row.day_of_week
                );
            }
            if row.values.len() != self.slots.len() {
                bail!(
                    "row (hour={}, day_of_week={}) has {} values for {} slots",
                    row.hour,
                    row.day_of_week,
                    row.values.len(),
                    self.slots.len()
                );
            }
            if i > 0 {
                let prev = &self.rows[i - 1];
                if (prev.hour, prev.day_of_week) >= (row.hour, row.day_of_week) {
                    bail!("rows are not strictly ordered by (hour, day_of_week)");
                }
            }
        }

        Ok(())
    }

    /// Slot identifiers in column order.
    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn slot_index(&self, slot_id: &str) -> Option<usize> {
        self.slots.iter().position(|s| s == slot_id)
    }

    pub fn row(&self, hour: u8, day_of_week: u8) -> Option<&TableRow> {
        self.rows
            .binary_search_by_key(&(hour, day_of_week), |r| (r.hour, r.day_of_week))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Stored availability, or `None` when the bucket or slot was never seen.
    pub fn get(&self, hour: u8, day_of_week: u8, slot_id: &str) -> Option<f64> {
        let col = self.slot_index(slot_id)?;
        self.row(hour, day_of_week).map(|r| r.values[col])
    }

    /// Rows observed for one day of the week, ordered by hour.
    pub fn rows_for_day(&self, day_of_week: u8) -> impl Iterator<Item = &TableRow> {
        self.rows.iter().filter(move |r| r.day_of_week == day_of_week)
    }
}
