//! Model quality report against an aggregated table.
//!
//! Regression scores compare predicted and observed availability per slot and
//! average them with equal weight. Classification scores threshold both sides
//! at 0.5 ("likely free"). Bias and variance come from refitting the
//! interpolation model under k-fold cross-validation and scoring R² on each
//! held-out fold.

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::ProbabilityTable;
use crate::aggregate::utility::{mean, variance};
use crate::model::{FittedModel, HourlyInterpolationModel};
use crate::predict::Predictor;

const FREE_THRESHOLD: f64 = 0.5;
const CV_FOLDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotScores {
    pub slot_id: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub buckets: usize,
    pub slots: usize,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub explained_variance: f64,
    pub accuracy: f64,
    pub avg_precision: f64,
    pub avg_recall: f64,
    pub avg_f1: f64,
    /// `1 - mean(R²)` over the cross-validation folds; `None` below two rows.
    pub bias: Option<f64>,
    /// Population standard deviation of the fold R² scores.
    pub variance: Option<f64>,
    pub per_slot: Vec<SlotScores>,
}

/// Scores the predictor on every bucket of `table`.
///
/// Slots are matched by name; a model slot the table lacks is scored against
/// 0.0, and table columns the model does not know are ignored.
#[tracing::instrument(skip_all, fields(buckets = table.rows().len()))]
pub fn evaluate(predictor: &Predictor, table: &ProbabilityTable) -> Result<EvaluationReport> {
    if table.is_empty() {
        bail!("cannot evaluate against an empty table");
    }

    let slot_names = predictor.slot_names();
    let columns: Vec<Option<usize>> = slot_names.iter().map(|s| table.slot_index(s)).collect();

    // Column-major series: one Vec per model slot.
    let mut actual: Vec<Vec<f64>> = vec![Vec::with_capacity(table.rows().len()); slot_names.len()];
    let mut predicted = actual.clone();

    for row in table.rows() {
        let values = predictor.evaluate(f64::from(row.hour), row.day_of_week)?;
        for (i, value) in values.into_iter().enumerate() {
            actual[i].push(columns[i].map_or(0.0, |c| row.values[c]));
            predicted[i].push(value);
        }
    }

    let mut mse = Vec::new();
    let mut mae = Vec::new();
    let mut evs = Vec::new();
    let mut per_slot = Vec::new();
    let mut correct = 0usize;
    let mut total = 0usize;

    for (i, slot_id) in slot_names.iter().enumerate() {
        let (y, y_hat) = (&actual[i], &predicted[i]);
        let residuals: Vec<f64> = y.iter().zip(y_hat).map(|(a, p)| a - p).collect();

        mse.push(mean(&residuals.iter().map(|r| r * r).collect::<Vec<_>>()));
        mae.push(mean(&residuals.iter().map(|r| r.abs()).collect::<Vec<_>>()));

        let y_var = variance(y, mean(y));
        evs.push(score_ratio(variance(&residuals, mean(&residuals)), y_var));

        let confusion = Confusion::count(y, y_hat);
        correct += confusion.tp + confusion.tn;
        total += y.len();
        per_slot.push(SlotScores {
            slot_id: slot_id.clone(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
        });
    }

    let cv_scores = cross_validated_r2(table)?;
    let (bias, cv_variance) = match &cv_scores {
        Some(scores) => {
            let m = mean(scores);
            (Some(1.0 - m), Some(variance(scores, m).sqrt()))
        }
        None => (None, None),
    };

    let mse = mean(&mse);
    let report = EvaluationReport {
        buckets: table.rows().len(),
        slots: slot_names.len(),
        mse,
        rmse: mse.sqrt(),
        mae: mean(&mae),
        r2: uniform_r2(&actual, &predicted),
        explained_variance: mean(&evs),
        accuracy: if total == 0 { 0.0 } else { correct as f64 / total as f64 },
        avg_precision: mean(&per_slot.iter().map(|s| s.precision).collect::<Vec<_>>()),
        avg_recall: mean(&per_slot.iter().map(|s| s.recall).collect::<Vec<_>>()),
        avg_f1: mean(&per_slot.iter().map(|s| s.f1).collect::<Vec<_>>()),
        bias,
        variance: cv_variance,
        per_slot,
    };

    info!(
        mse = report.mse,
        r2 = report.r2,
        accuracy = report.accuracy,
        avg_f1 = report.avg_f1,
        bias = ?report.bias,
        "Evaluation complete"
    );
    Ok(report)
}

/// R² of each refit on `k - 1` folds, scored on the held-out fold.
///
/// Rows keep the table's (hour, day-of-week) order and row `i` lands in fold
/// `i % k`, so the split is reproducible. `k` shrinks to the row count on
/// small tables.
fn cross_validated_r2(table: &ProbabilityTable) -> Result<Option<Vec<f64>>> {
    let rows = table.rows();
    let width = table.slots().len();
    if rows.len() < 2 || width == 0 {
        return Ok(None);
    }

    let k = CV_FOLDS.min(rows.len());
    let mut scores = Vec::with_capacity(k);
    for fold in 0..k {
        let (held_out, train): (Vec<_>, Vec<_>) =
            rows.iter().enumerate().partition(|(i, _)| i % k == fold);
        let train = ProbabilityTable::from_sorted(
            table.slots().to_vec(),
            train.into_iter().map(|(_, row)| row.clone()).collect(),
        );
        let model = HourlyInterpolationModel::fit(&train);

        let mut actual: Vec<Vec<f64>> = vec![Vec::with_capacity(held_out.len()); width];
        let mut predicted = actual.clone();
        for (_, row) in held_out {
            let values = model.predict(f64::from(row.hour), row.day_of_week)?;
            for (i, value) in values.into_iter().enumerate() {
                actual[i].push(row.values[i]);
                predicted[i].push(value);
            }
        }
        scores.push(uniform_r2(&actual, &predicted));
    }

    debug!(folds = k, ?scores, "Cross-validation scores");
    Ok(Some(scores))
}

/// Per-slot R², averaged with equal weight over slots.
fn uniform_r2(actual: &[Vec<f64>], predicted: &[Vec<f64>]) -> f64 {
    let scores: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .map(|(y, y_hat)| {
            let ss_res = y.iter().zip(y_hat).map(|(a, p)| (a - p).powi(2)).sum::<f64>();
            let ss_tot = variance(y, mean(y)) * y.len() as f64;
            score_ratio(ss_res, ss_tot)
        })
        .collect();
    mean(&scores)
}

/// `1 - numerator / denominator`, with a constant target scoring 1.0 when
/// matched exactly and 0.0 otherwise.
fn score_ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator == 0.0 {
        1.0
    } else if denominator == 0.0 {
        0.0
    } else {
        1.0 - numerator / denominator
    }
}

#[derive(Debug, Default)]
struct Confusion {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

impl Confusion {
    fn count(actual: &[f64], predicted: &[f64]) -> Self {
        let mut c = Confusion::default();
        for (a, p) in actual.iter().zip(predicted) {
            match (*a >= FREE_THRESHOLD, *p >= FREE_THRESHOLD) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }

    fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::TableRow;
    use crate::error::ModelError;
    use crate::model::{FittedModel, ModelArtifact};

    fn table() -> ProbabilityTable {
        ProbabilityTable::new(
            vec!["A".into(), "B".into()],
            vec![
                TableRow {
                    hour: 8,
                    day_of_week: 0,
                    values: vec![1.0, 0.0],
                },
                TableRow {
                    hour: 9,
                    day_of_week: 0,
                    values: vec![0.0, 0.0],
                },
            ],
        )
        .unwrap()
    }

    struct ConstantModel(Vec<f64>);

    impl FittedModel for ConstantModel {
        fn predict(&self, _hour: f64, _day_of_week: u8) -> Result<Vec<f64>, ModelError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_perfect_model_scores() {
        let predictor = Predictor::from_artifact(ModelArtifact::fit(&table()));
        let report = evaluate(&predictor, &table()).unwrap();

        assert_eq!(report.buckets, 2);
        assert_eq!(report.mse, 0.0);
        assert_eq!(report.mae, 0.0);
        assert_eq!(report.r2, 1.0);
        assert_eq!(report.explained_variance, 1.0);
        assert_eq!(report.accuracy, 1.0);
        // Slot B is never free, so its precision and recall have no positives
        assert_eq!(report.per_slot[0].f1, 1.0);
        assert_eq!(report.per_slot[1].f1, 0.0);
        assert_eq!(report.avg_f1, 0.5);
        // Two folds, each refit on the other row: A misses, B matches
        assert_eq!(report.bias, Some(0.5));
        assert_eq!(report.variance, Some(0.0));
    }

    fn ramp_table() -> ProbabilityTable {
        let values = [0.0, 0.25, 0.5, 0.75, 1.0];
        ProbabilityTable::new(
            vec!["A".into()],
            values
                .iter()
                .enumerate()
                .map(|(i, v)| TableRow {
                    hour: 4 * i as u8,
                    day_of_week: 0,
                    values: vec![*v],
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_held_out_folds_expose_bias() {
        let table = ramp_table();
        let predictor = Predictor::from_artifact(ModelArtifact::fit(&table));
        let report = evaluate(&predictor, &table).unwrap();

        // In-sample the interpolation is exact
        assert_eq!(report.r2, 1.0);
        // Held out, hours 4..=12 interpolate exactly; 0 and 16 wrap past
        // midnight onto the wrong neighbours: fold scores [0, 1, 1, 1, 0]
        let bias = report.bias.unwrap();
        let variance = report.variance.unwrap();
        assert!((bias - 0.4).abs() < 1e-9, "bias = {bias}");
        assert!((variance - 0.24f64.sqrt()).abs() < 1e-9, "variance = {variance}");
    }

    #[test]
    fn test_single_row_table_has_no_cross_validation() {
        let table = ProbabilityTable::new(
            vec!["A".into()],
            vec![TableRow {
                hour: 8,
                day_of_week: 0,
                values: vec![1.0],
            }],
        )
        .unwrap();
        let predictor = Predictor::from_artifact(ModelArtifact::fit(&table));
        let report = evaluate(&predictor, &table).unwrap();

        assert_eq!(report.bias, None);
        assert_eq!(report.variance, None);
    }

    #[test]
    fn test_constant_model_scores() {
        let predictor = Predictor::new(
            Box::new(ConstantModel(vec![0.5, 0.5])),
            vec!["A".into(), "B".into()],
        );
        let report = evaluate(&predictor, &table()).unwrap();

        assert_eq!(report.mse, 0.25);
        assert_eq!(report.rmse, 0.5);
        assert_eq!(report.mae, 0.5);
        // A: ss_res = 0.5, ss_tot = 0.5 -> 0; B: constant target missed -> 0
        assert_eq!(report.r2, 0.0);
        // Every prediction is "free": A has tp=1 fp=1, B has fp=2
        assert_eq!(report.accuracy, 0.25);
        assert_eq!(report.per_slot[0].precision, 0.5);
        assert_eq!(report.per_slot[0].recall, 1.0);
        assert_eq!(report.per_slot[1].precision, 0.0);
    }

    #[test]
    fn test_missing_table_column_is_scored_as_zero() {
        let predictor = Predictor::new(
            Box::new(ConstantModel(vec![0.0])),
            vec!["Z".into()],
        );
        let report = evaluate(&predictor, &table()).unwrap();
        assert_eq!(report.mse, 0.0);
        assert_eq!(report.slots, 1);
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let predictor = Predictor::from_artifact(ModelArtifact::fit(&table()));
        assert!(evaluate(&predictor, &ProbabilityTable::default()).is_err());
    }
}
