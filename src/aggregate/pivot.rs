use crate::aggregate::types::{AggregatedRow, ProbabilityTable, TableRow};
use crate::aggregate::utility::{compare_slot_ids, mean};
use crate::events::{Event, Observation};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Aggregates raw log rows into a [`ProbabilityTable`].
///
/// Rows with an unparseable timestamp, empty slot id, or unknown status are
/// dropped without failing the run.
#[tracing::instrument(skip(events), fields(events = events.len()))]
pub fn aggregate_events(events: &[Event]) -> ProbabilityTable {
    let observations: Vec<Observation> = events.iter().filter_map(Event::observe).collect();

    let dropped = events.len() - observations.len();
    if dropped > 0 {
        info!(dropped, kept = observations.len(), "Dropped unusable event rows");
    }

    aggregate_observations(&observations)
}

pub fn aggregate_observations(observations: &[Observation]) -> ProbabilityTable {
    let table = pivot(&group_means(observations));
    debug!(
        slots = table.slots().len(),
        buckets = table.rows().len(),
        "Aggregated probability table"
    );
    table
}

/// Long-form means: one [`AggregatedRow`] per (hour, day-of-week, slot) that
/// has at least one observation, ordered by hour, day, then slot.
pub fn group_means(observations: &[Observation]) -> Vec<AggregatedRow> {
    let mut series: BTreeMap<(u8, u8), HashMap<&str, Vec<f64>>> = BTreeMap::new();

    for obs in observations {
        series
            .entry((obs.hour, obs.day_of_week))
            .or_default()
            .entry(obs.slot_id.as_str())
            .or_default()
            .push(obs.availability);
    }

    let mut rows = Vec::new();
    for ((hour, day_of_week), slots) in series {
        let mut slots: Vec<_> = slots.into_iter().collect();
        slots.sort_by(|a, b| compare_slot_ids(a.0, b.0));

        for (slot_id, values) in slots {
            rows.push(AggregatedRow {
                hour,
                day_of_week,
                slot_id: slot_id.to_string(),
                mean_availability: mean(&values),
            });
        }
    }

    rows
}

/// Pivots long-form rows into the wide table. Slots missing from an observed
/// bucket are filled with `0.0`.
pub fn pivot(rows: &[AggregatedRow]) -> ProbabilityTable {
    let distinct: HashSet<&str> = rows.iter().map(|r| r.slot_id.as_str()).collect();
    let mut slots: Vec<String> = distinct.into_iter().map(String::from).collect();
    slots.sort_by(|a, b| compare_slot_ids(a, b));

    let column: HashMap<&str, usize> = slots
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let mut wide: BTreeMap<(u8, u8), Vec<f64>> = BTreeMap::new();
    for row in rows {
        let values = wide
            .entry((row.hour, row.day_of_week))
            .or_insert_with(|| vec![0.0; slots.len()]);
        values[column[row.slot_id.as_str()]] = row.mean_availability;
    }

    let table_rows = wide
        .into_iter()
        .map(|((hour, day_of_week), values)| TableRow {
            hour,
            day_of_week,
            values,
        })
        .collect();

    ProbabilityTable::from_sorted(slots, table_rows)
}
