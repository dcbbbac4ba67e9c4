//! Event-log aggregation.
//!
//! Groups observations into (hour, day-of-week, slot) buckets, averages their
//! availability, and pivots the result into a wide [`ProbabilityTable`] with
//! one column per slot.

pub mod pivot;
pub mod types;
pub mod utility;

pub use pivot::{aggregate_events, aggregate_observations, group_means, pivot};
pub use types::{AggregatedRow, ProbabilityTable, TableRow};
