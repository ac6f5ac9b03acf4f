use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::split_station_id;
use super::picks::{Phase, Pick, PickRegistry};

/// Hidden session backup written on normal close, overwriting any prior one.
pub const BACKUP_PATH: &str = ".~wavepick.bak.json";

// ---------------------------------------------------------------------------
// PickRecord – one interchange row
// ---------------------------------------------------------------------------

/// One pick as it appears in JSON/CSV interchange files. Field order is the
/// CSV header order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickRecord {
    pub station_id: String,
    pub phase: String,
    /// RFC 3339 timestamp.
    pub time: String,
    pub station_lat: f64,
    pub station_lon: f64,
    /// String-encoded float; round-trips verbatim.
    pub amplitude: String,
    pub event_id: i64,
}

impl PickRecord {
    fn from_pick(pick: &Pick, event_id: i64) -> PickRecord {
        PickRecord {
            station_id: pick.station_id.clone(),
            phase: pick.phase.name().to_string(),
            time: pick.time.to_rfc3339_opts(SecondsFormat::Micros, true),
            station_lat: pick.station_lat,
            station_lon: pick.station_lon,
            amplitude: pick.amplitude.clone(),
            event_id,
        }
    }
}

/// Flattened interchange rows for the whole registry, event-then-pick order.
pub fn records(registry: &PickRegistry) -> Vec<PickRecord> {
    registry
        .events
        .iter()
        .flat_map(|ev| ev.picks.iter().map(|p| PickRecord::from_pick(p, ev.id)))
        .collect()
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write all picks as a JSON array. An empty registry writes `[]`.
pub fn export_json(path: &Path, registry: &PickRegistry) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &records(registry))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write all picks as CSV, header row first. With zero picks nothing is
/// written and no file is created.
pub fn export_csv(path: &Path, registry: &PickRegistry) -> Result<()> {
    let rows = records(registry);
    if rows.is_empty() {
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Session backup into the working directory.
pub fn write_backup(registry: &PickRegistry) -> Result<()> {
    export_json(Path::new(BACKUP_PATH), registry)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// A failed pick import. Validation failures abort the whole import and name
/// the offending value and file; nothing is committed to the registry.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not import phase '{phase}' in file {}", .path.display())]
    UnknownPhase { phase: String, path: PathBuf },
    #[error("malformed time '{value}' in file {}", .path.display())]
    MalformedTime { value: String, path: PathBuf },
    #[error("malformed amplitude '{value}' in file {}", .path.display())]
    MalformedAmplitude { value: String, path: PathBuf },
    #[error("malformed station id '{value}' in file {}", .path.display())]
    MalformedStationId { value: String, path: PathBuf },
}

/// Read a JSON pick file into the registry.
///
/// Every record is validated before the registry is touched. Events are
/// created in ascending id order, one per distinct `event_id`; picks then
/// attach in file order. The last created event ends up active. Returns the
/// number of imported picks.
pub fn import_json(path: &Path, registry: &mut PickRegistry) -> Result<usize, ImportError> {
    let text = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows: Vec<PickRecord> =
        serde_json::from_str(&text).map_err(|source| ImportError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut validated: Vec<(i64, Pick)> = Vec::with_capacity(rows.len());
    for row in &rows {
        let phase = Phase::from_name(&row.phase).ok_or_else(|| ImportError::UnknownPhase {
            phase: row.phase.clone(),
            path: path.to_path_buf(),
        })?;
        let time: DateTime<Utc> = DateTime::parse_from_rfc3339(&row.time)
            .map_err(|_| ImportError::MalformedTime {
                value: row.time.clone(),
                path: path.to_path_buf(),
            })?
            .with_timezone(&Utc);
        if row.amplitude.trim().parse::<f64>().is_err() {
            return Err(ImportError::MalformedAmplitude {
                value: row.amplitude.clone(),
                path: path.to_path_buf(),
            });
        }
        let [network, station, location, channel] =
            split_station_id(&row.station_id).map_err(|_| ImportError::MalformedStationId {
                value: row.station_id.clone(),
                path: path.to_path_buf(),
            })?;
        validated.push((
            row.event_id,
            Pick {
                station_id: row.station_id.clone(),
                network: network.to_string(),
                station: station.to_string(),
                location: location.to_string(),
                channel: channel.to_string(),
                station_lat: row.station_lat,
                station_lon: row.station_lon,
                time,
                phase,
                amplitude: row.amplitude.clone(),
            },
        ));
    }

    let distinct_ids: BTreeSet<i64> = validated.iter().map(|(id, _)| *id).collect();
    for id in distinct_ids {
        registry.add_event(Some(id));
    }
    let count = validated.len();
    for (event_id, pick) in validated {
        registry.attach_pick(event_id, pick);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::picks::PickRequest;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wavepick_{}_{name}", std::process::id()))
    }

    fn request(station_id: &str, amplitude: f64) -> PickRequest {
        PickRequest {
            station_id: station_id.to_string(),
            station_lat: 46.2,
            station_lon: 7.5,
            time: DateTime::parse_from_rfc3339("2024-03-01T12:00:00.250000Z")
                .unwrap()
                .with_timezone(&Utc),
            amplitude,
        }
    }

    fn sample_registry() -> PickRegistry {
        let mut registry = PickRegistry::new();
        registry.add_event(None);
        registry
            .record_pick(&request("XX.STA1.00.BHZ", 0.25), Phase::P)
            .unwrap();
        registry
            .record_pick(&request("XX.STA2.00.BHN", -1.5), Phase::S)
            .unwrap();
        registry.add_event(Some(9));
        registry
            .record_pick(&request("XX.STA1.00.BHE", 3.0), Phase::Amp)
            .unwrap();
        registry
    }

    #[test]
    fn json_export_import_round_trips_the_flattened_pick_list() {
        let path = temp_path("roundtrip.json");
        let registry = sample_registry();
        export_json(&path, &registry).unwrap();

        let mut imported = PickRegistry::new();
        let n = import_json(&path, &mut imported).unwrap();
        assert_eq!(n, 3);
        assert_eq!(records(&imported), records(&registry));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn empty_registry_exports_an_empty_json_array() {
        let path = temp_path("empty.json");
        export_json(&path, &PickRegistry::new()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), "[]");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn csv_export_writes_header_then_rows() {
        let path = temp_path("picks.csv");
        export_csv(&path, &sample_registry()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "station_id,phase,time,station_lat,station_lon,amplitude,event_id"
        );
        assert_eq!(lines.count(), 3);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn csv_export_with_zero_picks_creates_no_file() {
        let path = temp_path("no_picks.csv");
        export_csv(&path, &PickRegistry::new()).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn unknown_phase_aborts_the_import_and_names_the_value_and_file() {
        let path = temp_path("bad_phase.json");
        std::fs::write(
            &path,
            r#"[{"station_id": "XX.STA1.00.BHZ", "phase": "X",
                "time": "2024-03-01T12:00:00Z", "station_lat": 0.0,
                "station_lon": 0.0, "amplitude": "1.0", "event_id": 1}]"#,
        )
        .unwrap();

        let mut registry = PickRegistry::new();
        let err = import_json(&path, &mut registry).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'X'"), "message was: {message}");
        assert!(message.contains("bad_phase.json"), "message was: {message}");
        assert!(registry.events.is_empty());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed_time_fails_the_whole_import_without_partial_commit() {
        let path = temp_path("bad_time.json");
        std::fs::write(
            &path,
            r#"[{"station_id": "XX.STA1.00.BHZ", "phase": "P",
                "time": "2024-03-01T12:00:00Z", "station_lat": 0.0,
                "station_lon": 0.0, "amplitude": "1.0", "event_id": 1},
               {"station_id": "XX.STA2.00.BHZ", "phase": "S",
                "time": "not a time", "station_lat": 0.0,
                "station_lon": 0.0, "amplitude": "1.0", "event_id": 2}]"#,
        )
        .unwrap();

        let mut registry = PickRegistry::new();
        let err = import_json(&path, &mut registry).unwrap_err();
        assert!(matches!(err, ImportError::MalformedTime { .. }));
        assert!(registry.events.is_empty());
        assert_eq!(registry.pick_count(), 0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn import_creates_events_in_ascending_id_order() {
        let path = temp_path("event_order.json");
        std::fs::write(
            &path,
            r#"[{"station_id": "XX.STA1.00.BHZ", "phase": "P",
                "time": "2024-03-01T12:00:00Z", "station_lat": 0.0,
                "station_lon": 0.0, "amplitude": "1.0", "event_id": 3},
               {"station_id": "XX.STA2.00.BHZ", "phase": "S",
                "time": "2024-03-01T12:00:05Z", "station_lat": 0.0,
                "station_lon": 0.0, "amplitude": "2.0", "event_id": 1},
               {"station_id": "XX.STA3.00.BHZ", "phase": "2",
                "time": "2024-03-01T12:00:09Z", "station_lat": 0.0,
                "station_lon": 0.0, "amplitude": "0.5", "event_id": 3}]"#,
        )
        .unwrap();

        let mut registry = PickRegistry::new();
        import_json(&path, &mut registry).unwrap();
        let ids: Vec<i64> = registry.events.iter().map(|ev| ev.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(registry.get_event(3).unwrap().picks.len(), 2);
        assert_eq!(registry.get_event(1).unwrap().picks.len(), 1);
        // Phase names resolved case-insensitively, amplitudes kept as text.
        assert_eq!(registry.get_event(3).unwrap().picks[1].phase, Phase::M2);
        assert_eq!(registry.get_event(1).unwrap().picks[0].amplitude, "2.0");

        std::fs::remove_file(&path).unwrap();
    }
}
