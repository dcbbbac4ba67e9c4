//! Runtime settings read from the environment (and `.env`, once loaded).

use anyhow::{Context, Result};

use crate::rank::DEFAULT_TOP_N;

pub const DEFAULT_EVENT_LOG: &str = "parking_dataset.csv";
pub const DEFAULT_MODEL_PATH: &str = "models/parking_prob_model.json";
pub const DEFAULT_LOG_FILE: &str = "logs/parking_forecast.log";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// `PARKING_EVENT_LOG`: CSV file live events are appended to.
    pub event_log: String,
    /// `PARKING_MODEL_PATH`: fitted model artifact.
    pub model_path: String,
    /// `PARKING_API_KEY`: read key appended to HTTP event-log sources.
    pub api_key: Option<String>,
    /// `PARKING_TOP_N`: slots listed per prediction.
    pub top_n: usize,
    /// `LOG_FILE_PATH`: JSON log file, rotated daily.
    pub log_file_path: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let top_n = match var("PARKING_TOP_N") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PARKING_TOP_N must be a non-negative integer, got '{raw}'"))?,
            None => DEFAULT_TOP_N,
        };

        Ok(Settings {
            event_log: var("PARKING_EVENT_LOG").unwrap_or_else(|| DEFAULT_EVENT_LOG.to_string()),
            model_path: var("PARKING_MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            api_key: var("PARKING_API_KEY"),
            top_n,
            log_file_path: var("LOG_FILE_PATH").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.event_log, DEFAULT_EVENT_LOG);
        assert_eq!(s.model_path, DEFAULT_MODEL_PATH);
        assert_eq!(s.api_key, None);
        assert_eq!(s.top_n, 10);
        assert_eq!(s.log_file_path, DEFAULT_LOG_FILE);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("PARKING_EVENT_LOG", "data/events.csv"),
            ("PARKING_API_KEY", "READ123"),
            ("PARKING_TOP_N", " 3 "),
        ])
        .unwrap();
        assert_eq!(s.event_log, "data/events.csv");
        assert_eq!(s.api_key.as_deref(), Some("READ123"));
        assert_eq!(s.top_n, 3);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let s = settings(&[("PARKING_API_KEY", "  "), ("PARKING_MODEL_PATH", "")]).unwrap();
        assert_eq!(s.api_key, None);
        assert_eq!(s.model_path, DEFAULT_MODEL_PATH);
    }

    #[test]
    fn test_invalid_top_n() {
        assert!(settings(&[("PARKING_TOP_N", "ten")]).is_err());
    }
}
