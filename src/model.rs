//! Fitted availability models and their persisted form.
//!
//! A [`FittedModel`] maps an (hour, day-of-week) query to one value per slot.
//! Values come back in the order of the slot names stored beside the model in
//! the [`ModelArtifact`]; nothing else ties a value to its slot.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::aggregate::ProbabilityTable;
use crate::error::ModelError;

const SCHEMA_VERSION: u8 = 1;

/// A previously fitted function `f(hour, day_of_week) -> availability per slot`.
///
/// Implementations are regressors, not classifiers: returned values are not
/// guaranteed to stay within `[0, 1]` and callers must not assume they do.
pub trait FittedModel: Send + Sync {
    /// Evaluates the model at exactly `hour` (fractional hours are not
    /// rounded) on `day_of_week` (0 = Monday).
    fn predict(&self, hour: f64, day_of_week: u8) -> Result<Vec<f64>, ModelError>;
}

/// Piecewise-linear model over the hourly buckets of each weekday.
///
/// A query between two observed hours of the same weekday blends them
/// linearly, wrapping past midnight. A weekday with a single observed hour
/// returns that row everywhere, and a weekday with none returns zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyInterpolationModel {
    table: ProbabilityTable,
}

impl HourlyInterpolationModel {
    pub fn fit(table: &ProbabilityTable) -> Self {
        Self {
            table: table.clone(),
        }
    }

    pub fn table(&self) -> &ProbabilityTable {
        &self.table
    }
}

impl FittedModel for HourlyInterpolationModel {
    fn predict(&self, hour: f64, day_of_week: u8) -> Result<Vec<f64>, ModelError> {
        let width = self.table.slots().len();
        if width == 0 {
            return Err(ModelError::Empty);
        }
        if !hour.is_finite() {
            return Err(ModelError::Evaluation {
                reason: format!("hour must be finite, got {hour}"),
            });
        }

        let rows: Vec<_> = self.table.rows_for_day(day_of_week).collect();
        let (first, last) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(vec![0.0; width]),
        };
        if rows.len() == 1 {
            return Ok(first.values.clone());
        }

        let (lo, lo_hour) = match rows.iter().rev().find(|r| f64::from(r.hour) <= hour) {
            Some(r) => (*r, f64::from(r.hour)),
            None => (last, f64::from(last.hour) - 24.0),
        };
        let (hi, hi_hour) = match rows.iter().find(|r| f64::from(r.hour) > hour) {
            Some(r) => (*r, f64::from(r.hour)),
            None => (first, f64::from(first.hour) + 24.0),
        };

        if lo_hour == hour {
            return Ok(lo.values.clone());
        }

        let t = (hour - lo_hour) / (hi_hour - lo_hour);
        Ok(lo
            .values
            .iter()
            .zip(&hi.values)
            .map(|(a, b)| a + (b - a) * t)
            .collect())
    }
}

/// A fitted model saved together with its slot column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u8,
    pub trained_at: DateTime<Utc>,
    pub slot_names: Vec<String>,
    pub model: HourlyInterpolationModel,
}

impl ModelArtifact {
    pub fn fit(table: &ProbabilityTable) -> Self {
        ModelArtifact {
            schema_version: SCHEMA_VERSION,
            trained_at: Utc::now(),
            slot_names: table.slots().to_vec(),
            model: HourlyInterpolationModel::fit(table),
        }
    }

    /// Writes the artifact as JSON, replacing any previous file atomically.
    #[tracing::instrument(skip_all, fields(path = %path.display(), slots = self.slot_names.len()))]
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir)?;

        let temp_file = NamedTempFile::new_in(parent_dir)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file());
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        temp_file
            .persist(path)
            .with_context(|| format!("failed to persist model to {}", path.display()))?;

        info!("Model artifact saved");
        Ok(())
    }

    /// Loads and checks an artifact written by [`ModelArtifact::save`].
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open model {}", path.display()))?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse model {}", path.display()))?;

        if artifact.schema_version != SCHEMA_VERSION {
            bail!(
                "unsupported model schema version {} (expected {})",
                artifact.schema_version,
                SCHEMA_VERSION
            );
        }
        artifact.model.table().validate()?;
        if artifact.slot_names != artifact.model.table().slots() {
            bail!("model slot names do not match the fitted table columns");
        }

        debug!(
            slots = artifact.slot_names.len(),
            trained_at = %artifact.trained_at,
            "Model artifact loaded"
        );
        Ok(artifact)
    }

    /// Splits the artifact into the fitted function and its slot order.
    pub fn into_parts(self) -> (Box<dyn FittedModel>, Vec<String>) {
        (Box::new(self.model), self.slot_names)
    }
}
