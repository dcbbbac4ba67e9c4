//! Ranking of per-slot predictions.
//!
//! Every probability leaving this module is a percentage, including the
//! expected free count (a value of 150.0 means one and a half slots).

use serde::Serialize;
use std::cmp::Ordering;

use crate::predict::PredictionResult;

/// Number of slots reported when the caller does not ask for a specific count.
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSlot {
    pub slot_id: String,
    pub probability_pct: f64,
}

/// Slots most likely to be free, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub hour: f64,
    pub day_of_week: u8,
    pub total_slots: usize,
    pub slots: Vec<RankedSlot>,
    /// Sum over all slots, not only the ones kept in `slots`.
    pub expected_free_count: f64,
}

pub fn to_pct(p: f64) -> f64 {
    p * 100.0
}

/// Sorts slots by descending probability and keeps the first `top_n`.
///
/// Equal probabilities keep the model's column order. A NaN probability ranks
/// below every number.
pub fn rank(result: &PredictionResult, top_n: usize) -> Ranking {
    let probabilities = &result.probabilities;

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        descending(probabilities[a].probability, probabilities[b].probability).then(a.cmp(&b))
    });

    let slots = order
        .into_iter()
        .take(top_n)
        .map(|i| RankedSlot {
            slot_id: probabilities[i].slot_id.clone(),
            probability_pct: to_pct(probabilities[i].probability),
        })
        .collect();

    Ranking {
        hour: result.hour,
        day_of_week: result.day_of_week,
        total_slots: probabilities.len(),
        slots,
        expected_free_count: to_pct(result.expected_free_count()),
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    let key = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v };
    key(b).total_cmp(&key(a))
}
