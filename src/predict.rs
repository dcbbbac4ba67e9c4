//! The prediction service.
//!
//! A [`Predictor`] is built once from a loaded model and is read-only
//! afterwards; every call is an independent, deterministic computation.

use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::utility::mean;
use crate::error::{ForecastError, ModelError};
use crate::model::{FittedModel, ModelArtifact};
use crate::rank::{Ranking, rank, to_pct};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotProbability {
    pub slot_id: String,
    pub probability: f64,
}

/// Raw model output for one query, in slot column order.
///
/// Probabilities are fractions straight from the model and may fall outside
/// `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub hour: f64,
    pub day_of_week: u8,
    pub probabilities: Vec<SlotProbability>,
}

impl PredictionResult {
    /// Expected number of simultaneously free slots, as a fraction sum.
    pub fn expected_free_count(&self) -> f64 {
        self.probabilities.iter().map(|p| p.probability).sum()
    }
}

/// A validated (hour, day-of-week) query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Query {
    pub hour: f64,
    pub day_of_week: u8,
}

impl Query {
    /// Validates numeric input: `hour` must be finite and in `[0, 24)`,
    /// `day_of_week` in `0..=6`.
    pub fn new(hour: f64, day_of_week: i64) -> Result<Self, ForecastError> {
        if !hour.is_finite() {
            return Err(ForecastError::invalid("hour", format!("{hour} is not a finite number")));
        }
        if !(0.0..24.0).contains(&hour) {
            return Err(ForecastError::invalid("hour", format!("{hour} is outside [0, 24)")));
        }
        let day_of_week = u8::try_from(day_of_week)
            .ok()
            .filter(|d| *d <= 6)
            .ok_or_else(|| {
                ForecastError::invalid("day", format!("{day_of_week} is outside 0..=6"))
            })?;

        Ok(Query { hour, day_of_week })
    }

    /// Parses form-style string input. Hours may be fractional; days must be
    /// whole numbers.
    pub fn parse(hour: Option<&str>, day: Option<&str>) -> Result<Self, ForecastError> {
        let hour = hour
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ForecastError::invalid("hour", "missing"))?;
        let day = day
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ForecastError::invalid("day", "missing"))?;

        let hour: f64 = hour
            .parse()
            .map_err(|_| ForecastError::invalid("hour", format!("'{hour}' is not a number")))?;
        let day: i64 = day
            .parse()
            .map_err(|_| ForecastError::invalid("day", format!("'{day}' is not an integer")))?;

        Query::new(hour, day)
    }
}

/// Hour and weekday with the highest average availability across slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestTime {
    pub hour: u8,
    pub day_of_week: u8,
    pub avg_availability_pct: f64,
}

pub struct Predictor {
    model: Box<dyn FittedModel>,
    slot_names: Vec<String>,
}

impl Predictor {
    pub fn new(model: Box<dyn FittedModel>, slot_names: Vec<String>) -> Self {
        Self { model, slot_names }
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        let (model, slot_names) = artifact.into_parts();
        Self::new(model, slot_names)
    }

    pub fn slot_names(&self) -> &[String] {
        &self.slot_names
    }

    /// Per-slot free probability for a query.
    ///
    /// # Errors
    ///
    /// [`ForecastError::Prediction`] when the model fails or returns a vector
    /// whose length differs from the slot list.
    pub fn predict(&self, query: Query) -> Result<PredictionResult, ForecastError> {
        let values = self.evaluate(query.hour, query.day_of_week)?;

        let probabilities = self
            .slot_names
            .iter()
            .zip(values)
            .map(|(slot_id, probability)| SlotProbability {
                slot_id: slot_id.clone(),
                probability,
            })
            .collect();

        Ok(PredictionResult {
            hour: query.hour,
            day_of_week: query.day_of_week,
            probabilities,
        })
    }

    /// Validates the input, predicts, and ranks the top `top_n` slots.
    #[tracing::instrument(skip(self))]
    pub fn compute_predictions(
        &self,
        hour: f64,
        day_of_week: i64,
        top_n: usize,
    ) -> Result<Ranking, ForecastError> {
        let query = Query::new(hour, day_of_week)?;
        let result = self.predict(query)?;
        let ranking = rank(&result, top_n);

        debug!(
            returned = ranking.slots.len(),
            expected_free_count = ranking.expected_free_count,
            "Predictions computed"
        );
        Ok(ranking)
    }

    /// String-input variant of [`Predictor::compute_predictions`].
    pub fn compute_predictions_from_form(
        &self,
        hour: Option<&str>,
        day: Option<&str>,
        top_n: usize,
    ) -> Result<Ranking, ForecastError> {
        let query = Query::parse(hour, day)?;
        self.compute_predictions(query.hour, i64::from(query.day_of_week), top_n)
    }

    /// Scans every whole hour of every weekday and returns the bucket with the
    /// highest mean availability. Ties go to the earliest hour, then the
    /// earliest day. Buckets whose average is not finite are skipped.
    #[tracing::instrument(skip(self))]
    pub fn best_time(&self) -> Result<BestTime, ForecastError> {
        let mut best: Option<BestTime> = None;

        for hour in 0..24u8 {
            for day_of_week in 0..7u8 {
                let values = self.evaluate(f64::from(hour), day_of_week)?;
                let avg_availability_pct = to_pct(mean(&values));
                if !avg_availability_pct.is_finite() {
                    debug!(hour, day_of_week, "Skipping non-finite availability");
                    continue;
                }

                let better = match &best {
                    Some(b) => avg_availability_pct > b.avg_availability_pct,
                    None => true,
                };
                if better {
                    best = Some(BestTime {
                        hour,
                        day_of_week,
                        avg_availability_pct,
                    });
                }
            }
        }

        best.ok_or_else(|| {
            ModelError::Evaluation {
                reason: "no hour and weekday has a finite availability".to_string(),
            }
            .into()
        })
    }

    /// Calls the model and checks the output shape.
    pub(crate) fn evaluate(&self, hour: f64, day_of_week: u8) -> Result<Vec<f64>, ForecastError> {
        if self.slot_names.is_empty() {
            return Err(ModelError::Empty.into());
        }

        let values = self
            .model
            .predict(hour, day_of_week)
            .inspect_err(|e| warn!(error = %e, hour, day_of_week, "Model evaluation failed"))?;

        if values.len() != self.slot_names.len() {
            warn!(
                expected = self.slot_names.len(),
                actual = values.len(),
                "Model output does not match slot list"
            );
            return Err(ModelError::ShapeMismatch {
                expected: self.slot_names.len(),
                actual: values.len(),
            }
            .into());
        }

        Ok(values)
    }
}
