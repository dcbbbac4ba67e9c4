//! Persistence of live events and rendering of prediction results.
//!
//! Supports CSV append, pretty-printing, and JSON serialization.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::events::Event;
use crate::predict::BestTime;
use crate::rank::Ranking;
use csv::WriterBuilder;
use std::fs::{self, OpenOptions};
use std::path::Path;

/// Appends an [`Event`] as a row to the CSV event log.
///
/// Writes the header first when the file is missing or empty.
pub fn append_event(path: &str, event: &Event) -> Result<()> {
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    debug!(path, needs_header, "Appending event");

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);

    writer.serialize(event)?;
    writer.flush()?;

    info!(slot_id = %event.slot_id, status = %event.status, at = %event.created_at, "Event logged");
    Ok(())
}

/// Writes any serializable value as pretty JSON, creating parent directories.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(value)?)?;
    debug!(path, "JSON written");
    Ok(())
}

/// Formats a ranking as human-readable lines.
pub fn format_ranking(ranking: &Ranking) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Prediction for hour={}, dayofweek={}",
            ranking.hour, ranking.day_of_week
        ),
        format!("Total slots: {}", ranking.total_slots),
        format!("Expected available slots: {:.2}%", ranking.expected_free_count),
        format!("Top {} slots likely to be free:", ranking.slots.len()),
    ];
    lines.extend(
        ranking
            .slots
            .iter()
            .map(|s| format!("{}: {:.2}% chance free", s.slot_id, s.probability_pct)),
    );
    lines
}

/// Logs a ranking line by line.
pub fn print_pretty(ranking: &Ranking) {
    for line in format_ranking(ranking) {
        info!("{}", line);
    }
}

/// Logs any result as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_best_time(best: &BestTime) -> String {
    format!(
        "Best time for parking: hour {}, day of week {}, average availability {:.2}%",
        best.hour, best.day_of_week, best.avg_availability_pct
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Status, read_events};
    use crate::rank::RankedSlot;
    use chrono::NaiveDate;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    fn event(slot_id: &str, status: Status) -> Event {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        Event::at(ts, slot_id, status)
    }

    fn ranking() -> Ranking {
        Ranking {
            hour: 8.0,
            day_of_week: 1,
            total_slots: 3,
            slots: vec![
                RankedSlot {
                    slot_id: "A".into(),
                    probability_pct: 90.0,
                },
                RankedSlot {
                    slot_id: "C".into(),
                    probability_pct: 50.0,
                },
            ],
            expected_free_count: 150.0,
        }
    }

    #[test]
    fn test_append_event_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "logs/parking_dataset.csv");

        append_event(&path, &event("1", Status::Free)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().collect::<Vec<_>>(),
            vec!["created_at,slot_id,status", "2024-01-01 08:30:00,1,1"]
        );
    }

    #[test]
    fn test_append_event_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "events.csv");

        append_event(&path, &event("1", Status::Free)).unwrap();
        append_event(&path, &event("2", Status::Occupied)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("created_at")).count();
        assert_eq!(header_count, 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_append_event_to_empty_file_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "events.csv");
        fs::write(&path, "").unwrap();

        append_event(&path, &event("1", Status::Free)).unwrap();
        append_event(&path, &event("2", Status::Free)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("created_at,slot_id,status\n"));
        let events = read_events(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_appended_log_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "events.csv");

        append_event(&path, &event("7", Status::Occupied)).unwrap();
        let events = read_events(fs::File::open(&path).unwrap()).unwrap();

        assert_eq!(events, vec![event("7", Status::Occupied)]);
        assert_eq!(events[0].observe().unwrap().availability, 0.0);
    }

    #[test]
    fn test_format_ranking() {
        let lines = format_ranking(&ranking());
        assert_eq!(lines[2], "Expected available slots: 150.00%");
        assert_eq!(lines[4], "A: 90.00% chance free");
        assert_eq!(lines[5], "C: 50.00% chance free");
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&ranking()).unwrap();
        print_pretty(&ranking());
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "out/ranking.json");
        write_json(&path, &ranking()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["expected_free_count"], 150.0);
        assert_eq!(value["slots"][0]["slot_id"], "A");
    }
}
