//! Sensor events and the CSV event log they are recorded in.
//!
//! The log is append-only. Rows whose timestamp, slot id, or status cannot be
//! interpreted are skipped when read back for aggregation.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use tracing::debug;

/// Timestamp layout used when recording new events.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Occupancy state reported by a slot sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Free,
    Occupied,
}

impl Status {
    /// Availability value stored in the log: 1 when free, 0 when occupied.
    pub fn availability(self) -> f64 {
        match self {
            Status::Free => 1.0,
            Status::Occupied => 0.0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "available" | "vacant" | "empty" | "1" => Some(Status::Free),
            "occupied" | "taken" | "busy" | "full" | "0" => Some(Status::Occupied),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Free => write!(f, "free"),
            Status::Occupied => write!(f, "occupied"),
        }
    }
}

/// One row of the event log, as written.
///
/// Field names follow the logger (`slot_id`, `status`); exports from the
/// sensor channel use `field1`/`field2` for the same columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub created_at: String,
    #[serde(alias = "field1")]
    pub slot_id: String,
    #[serde(alias = "field2")]
    pub status: String,
}

impl Event {
    /// Builds an event stamped with the current local time.
    pub fn now(slot_id: &str, status: Status) -> Self {
        Self::at(Local::now().naive_local(), slot_id, status)
    }

    pub fn at(timestamp: NaiveDateTime, slot_id: &str, status: Status) -> Self {
        Event {
            created_at: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            slot_id: slot_id.to_string(),
            status: format!("{}", status.availability() as u8),
        }
    }

    /// Resolves the row into an [`Observation`], or `None` when any column is
    /// unusable.
    pub fn observe(&self) -> Option<Observation> {
        let timestamp = parse_timestamp(&self.created_at)?;
        let slot_id = self.slot_id.trim();
        if slot_id.is_empty() || slot_id == "-" {
            return None;
        }
        let availability = parse_availability(&self.status)?;

        Some(Observation {
            hour: timestamp.hour() as u8,
            day_of_week: timestamp.weekday().num_days_from_monday() as u8,
            slot_id: slot_id.to_string(),
            availability,
        })
    }
}

/// An event reduced to its time bucket and availability value.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub hour: u8,
    pub day_of_week: u8,
    pub slot_id: String,
    pub availability: f64,
}

/// Parses the raw message the sensor board posts, e.g. `SLOT,1,OCCUPIED`.
pub fn parse_sensor_message(message: &str) -> Result<(String, Status)> {
    let mut parts = message.trim().split(',').map(str::trim);

    if parts.next() != Some("SLOT") {
        return Err(anyhow!("not a slot message: '{message}'"));
    }

    let slot_id = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("slot message has no slot id: '{message}'"))?;
    let status = parts
        .next()
        .and_then(Status::parse)
        .ok_or_else(|| anyhow!("slot message has no valid status: '{message}'"))?;

    Ok((slot_id.to_string(), status))
}

/// Interprets the status column as an availability value.
///
/// Named states map to 1.0 / 0.0; any other finite number is taken as is.
pub fn parse_availability(raw: &str) -> Option<f64> {
    if let Some(status) = Status::parse(raw) {
        return Some(status.availability());
    }
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a log timestamp into its wall-clock value.
///
/// Offsets are kept as written rather than converted, so the hour bucket is
/// the hour the sensor reported.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(" UTC").unwrap_or(raw);

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    const LAYOUTS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for layout in LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Reads every row of a CSV event log.
///
/// Rows that fail to deserialize are skipped.
pub fn read_events<R: Read>(reader: R) -> Result<Vec<Event>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut events = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize() {
        match result {
            Ok(event) => events.push(event),
            Err(e) => {
                skipped += 1;
                debug!(error = %e, "Skipping unreadable event row");
            }
        }
    }

    debug!(rows = events.len(), skipped, "Event log read");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor_message() {
        let (slot, status) = parse_sensor_message("SLOT,1,OCCUPIED").unwrap();
        assert_eq!(slot, "1");
        assert_eq!(status, Status::Occupied);

        let (slot, status) = parse_sensor_message(" SLOT, B7 ,free ").unwrap();
        assert_eq!(slot, "B7");
        assert_eq!(status, Status::Free);
    }

    #[test]
    fn test_parse_sensor_message_rejects_other_events() {
        assert!(parse_sensor_message("BOOT,ok").is_err());
        assert!(parse_sensor_message("SLOT,,FREE").is_err());
        assert!(parse_sensor_message("SLOT,3,MAYBE").is_err());
        assert!(parse_sensor_message("SLOT,3").is_err());
    }

    #[test]
    fn test_parse_availability() {
        assert_eq!(parse_availability("1"), Some(1.0));
        assert_eq!(parse_availability("0"), Some(0.0));
        assert_eq!(parse_availability("FREE"), Some(1.0));
        assert_eq!(parse_availability("Occupied"), Some(0.0));
        assert_eq!(parse_availability("0.25"), Some(0.25));
        assert_eq!(parse_availability("-"), None);
        assert_eq!(parse_availability("NaN"), None);
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 15, 30)
            .unwrap();

        assert_eq!(parse_timestamp("2024-03-04 10:15:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-04T10:15:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-04 10:15:30 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-04T10:15:30+05:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-04T10:15:30Z"), Some(expected));
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_observe_buckets_by_hour_and_monday_based_day() {
        // 2024-03-06 is a Wednesday
        let event = Event {
            created_at: "2024-03-06 05:59:59".to_string(),
            slot_id: "A".to_string(),
            status: "1".to_string(),
        };
        let obs = event.observe().unwrap();
        assert_eq!(obs.hour, 5);
        assert_eq!(obs.day_of_week, 2);
        assert_eq!(obs.slot_id, "A");
        assert_eq!(obs.availability, 1.0);
    }

    #[test]
    fn test_observe_drops_unusable_rows() {
        let bad_time = Event {
            created_at: "not a time".to_string(),
            slot_id: "A".to_string(),
            status: "1".to_string(),
        };
        let placeholder = Event {
            created_at: "2024-03-06 05:00:00".to_string(),
            slot_id: "-".to_string(),
            status: "-".to_string(),
        };
        assert!(bad_time.observe().is_none());
        assert!(placeholder.observe().is_none());
    }

    #[test]
    fn test_event_at_records_numeric_status() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let event = Event::at(ts, "12", Status::Occupied);
        assert_eq!(event.created_at, "2024-01-01 08:00:00");
        assert_eq!(event.status, "0");
    }

    #[test]
    fn test_read_events_accepts_channel_headers() {
        let csv = "created_at,entry_id,field1,field2\n\
                   2024-01-01 08:00:00 UTC,1,3,1\n\
                   2024-01-01 09:00:00 UTC,2,4,0\n";
        let events = read_events(csv.as_bytes()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].slot_id, "3");
        assert_eq!(events[1].status, "0");
    }

    #[test]
    fn test_read_events_skips_short_rows() {
        let csv = "created_at,slot_id,status\n\
                   2024-01-01 08:00:00,A,1\n\
                   2024-01-01 08:05:00\n";
        let events = read_events(csv.as_bytes()).unwrap();
        assert_eq!(events.len(), 1);
    }
}
