pub mod aggregate;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod events;
pub mod fetch;
pub mod model;
pub mod output;
pub mod predict;
pub mod rank;

pub use error::{ForecastError, ModelError};
pub use predict::Predictor;
