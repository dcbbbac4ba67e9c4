//! Typed errors surfaced by the prediction pipeline.

/// Failure raised by a fitted model while evaluating a query.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model has no slots")]
    Empty,

    #[error("feature shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("model evaluation failed: {reason}")]
    Evaluation { reason: String },
}

/// Errors returned to whoever serves predictions.
///
/// Input problems are reported before the model is touched; anything the
/// model itself raises is wrapped as [`ForecastError::Prediction`].
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("invalid input for '{field}': {reason}")]
    InputValidation { field: &'static str, reason: String },

    #[error("prediction failed: {0}")]
    Prediction(#[from] ModelError),
}

impl ForecastError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ForecastError::InputValidation {
            field,
            reason: reason.into(),
        }
    }

    /// HTTP status a web layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ForecastError::InputValidation { .. } => 400,
            ForecastError::Prediction(_) => 500,
        }
    }

    pub fn is_input_validation(&self) -> bool {
        matches!(self, ForecastError::InputValidation { .. })
    }
}
