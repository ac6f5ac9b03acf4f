use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// MetadataValue – a single station attribute
// ---------------------------------------------------------------------------

/// A dynamically-typed station attribute mirroring common trace-header dtypes.
/// Using `BTreeMap` / `BTreeSet` downstream so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text for simplicity.
    Date(String),
    Null,
}

// -- Manual Eq/Ord so we can sort stations by attribute --

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl MetadataValue {
    /// Numeric view of the value, for header fields like `delta`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trace / Channel – one component recording
// ---------------------------------------------------------------------------

/// A single evenly-sampled time series.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Absolute time of the first sample.
    pub start_time: DateTime<Utc>,
    /// Sample interval in seconds.
    pub delta: f64,
    pub samples: Vec<f64>,
}

impl Trace {
    /// Sampling rate in Hz.
    pub fn sampling_rate(&self) -> f64 {
        1.0 / self.delta
    }

    /// Absolute time of the last sample.
    pub fn end_time(&self) -> DateTime<Utc> {
        let span = self.delta * self.samples.len().saturating_sub(1) as f64;
        self.start_time + chrono::Duration::nanoseconds((span * 1e9) as i64)
    }
}

/// One channel of a station, exclusively owned by it.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel code, e.g. `"BHZ"`.
    pub code: String,
    pub trace: Trace,
}

impl Channel {
    /// Component letter – the last character of the channel code.
    pub fn component(&self) -> Option<char> {
        self.code.chars().last()
    }
}

// ---------------------------------------------------------------------------
// Station – one sensor site
// ---------------------------------------------------------------------------

/// Header fields of one trace row in an input file.
#[derive(Debug, Clone)]
pub struct TraceHeader {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub metadata: BTreeMap<String, MetadataValue>,
}

/// A sensor site with its component recordings. Channel membership is fixed
/// after construction; only `visible` is mutated interactively.
#[derive(Debug, Clone)]
pub struct Station {
    pub network: String,
    pub station: String,
    pub location: String,
    /// Decimal degrees, north positive.
    pub latitude: f64,
    /// Decimal degrees, east positive.
    pub longitude: f64,
    /// Meters above sea level.
    pub elevation: f64,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub channels: Vec<Channel>,
    /// Whether the station is rendered. Toggling never alters pick data.
    pub visible: bool,
}

impl Station {
    /// `"NET.STA"` label used in trees and plot titles.
    pub fn label(&self) -> String {
        format!("{}.{}", self.network, self.station)
    }

    /// Full SEED-style id `"NET.STA.LOC.CHA"` for the given channel code.
    pub fn station_id(&self, channel: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, channel
        )
    }

    /// The channel whose component letter matches, if any.
    pub fn channel_for_component(&self, component: char) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|ch| ch.component() == Some(component))
    }
}

/// Split a `"NET.STA.LOC.CHA"` id into its four fields.
///
/// Anything other than exactly four dot-separated fields is a fatal input
/// error for the record carrying the id.
pub fn split_station_id(id: &str) -> Result<[&str; 4]> {
    let parts: Vec<&str> = id.split('.').collect();
    match <[&str; 4]>::try_from(parts) {
        Ok(fields) => Ok(fields),
        Err(parts) => bail!(
            "station id '{id}' has {} dot-separated fields, expected 4",
            parts.len()
        ),
    }
}

// ---------------------------------------------------------------------------
// StationSet – the complete loaded dataset
// ---------------------------------------------------------------------------

/// All stations of a session, grouped from the flat rows of an input file.
#[derive(Debug, Clone, Default)]
pub struct StationSet {
    pub stations: Vec<Station>,
    /// Attribute key the set is currently sorted by, if any.
    pub sorted_by: Option<String>,
}

impl StationSet {
    /// Group flat `(header, trace)` rows into stations keyed by
    /// `(network, station)`. Row order decides station order; channels keep
    /// file order within their station.
    pub fn from_traces(rows: Vec<(TraceHeader, Trace)>) -> Self {
        let mut stations: Vec<Station> = Vec::new();
        for (header, trace) in rows {
            let channel = Channel {
                code: header.channel.clone(),
                trace,
            };
            match stations
                .iter_mut()
                .find(|s| s.network == header.network && s.station == header.station)
            {
                Some(existing) => existing.channels.push(channel),
                None => stations.push(Station {
                    network: header.network,
                    station: header.station,
                    location: header.location,
                    latitude: header.latitude,
                    longitude: header.longitude,
                    elevation: header.elevation,
                    metadata: header.metadata,
                    channels: vec![channel],
                    visible: false,
                }),
            }
        }
        StationSet {
            stations,
            sorted_by: None,
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Station> {
        self.stations.iter()
    }

    /// Indices of stations currently rendered.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.stations
            .iter()
            .enumerate()
            .filter(|(_, s)| s.visible)
            .map(|(i, _)| i)
            .collect()
    }

    /// Metadata keys present on every station, offered for sorting.
    pub fn sortable_attributes(&self) -> Vec<String> {
        let mut keys: Option<BTreeSet<String>> = None;
        for station in &self.stations {
            let station_keys: BTreeSet<String> = station.metadata.keys().cloned().collect();
            keys = Some(match keys {
                Some(k) => k.intersection(&station_keys).cloned().collect(),
                None => station_keys,
            });
        }
        keys.unwrap_or_default().into_iter().collect()
    }

    /// Stable sort by a metadata attribute; stations missing the key sort
    /// first (as `Null`).
    pub fn sort_by_attribute(&mut self, key: &str) {
        self.stations.sort_by(|a, b| {
            let va = a.metadata.get(key).unwrap_or(&MetadataValue::Null);
            let vb = b.metadata.get(key).unwrap_or(&MetadataValue::Null);
            va.cmp(vb)
        });
        self.sorted_by = Some(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(net: &str, sta: &str, cha: &str) -> TraceHeader {
        TraceHeader {
            network: net.to_string(),
            station: sta.to_string(),
            location: "00".to_string(),
            channel: cha.to_string(),
            latitude: 37.5,
            longitude: -122.0,
            elevation: 120.0,
            metadata: BTreeMap::new(),
        }
    }

    fn trace(n: usize) -> Trace {
        Trace {
            start_time: DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            delta: 0.01,
            samples: vec![0.0; n],
        }
    }

    #[test]
    fn rows_group_into_stations_by_network_and_station() {
        let rows = vec![
            (header("XX", "STA1", "BHZ"), trace(10)),
            (header("XX", "STA1", "BHN"), trace(10)),
            (header("XX", "STA2", "BHZ"), trace(10)),
        ];
        let set = StationSet::from_traces(rows);
        assert_eq!(set.len(), 2);
        assert_eq!(set.stations[0].channels.len(), 2);
        assert_eq!(set.stations[1].channels.len(), 1);
        assert_eq!(set.stations[0].label(), "XX.STA1");
    }

    #[test]
    fn component_lookup_matches_last_letter() {
        let rows = vec![
            (header("XX", "STA1", "BHZ"), trace(10)),
            (header("XX", "STA1", "BHE"), trace(10)),
        ];
        let set = StationSet::from_traces(rows);
        let station = &set.stations[0];
        assert_eq!(station.channel_for_component('E').unwrap().code, "BHE");
        assert!(station.channel_for_component('N').is_none());
    }

    #[test]
    fn station_id_splits_into_exactly_four_fields() {
        let fields = split_station_id("XX.STA1.00.BHZ").unwrap();
        assert_eq!(fields, ["XX", "STA1", "00", "BHZ"]);
        // Empty location is still a field.
        let fields = split_station_id("XX.STA1..BHZ").unwrap();
        assert_eq!(fields[2], "");
        assert!(split_station_id("XX.STA1.BHZ").is_err());
        assert!(split_station_id("XX.STA1.00.BHZ.EXTRA").is_err());
    }

    #[test]
    fn sort_by_attribute_orders_stations() {
        let mut h1 = header("XX", "STA1", "BHZ");
        h1.metadata
            .insert("distance".into(), MetadataValue::Float(42.0));
        let mut h2 = header("XX", "STA2", "BHZ");
        h2.metadata
            .insert("distance".into(), MetadataValue::Float(7.0));
        let mut set = StationSet::from_traces(vec![(h1, trace(4)), (h2, trace(4))]);

        assert_eq!(set.sortable_attributes(), vec!["distance".to_string()]);
        set.sort_by_attribute("distance");
        assert_eq!(set.stations[0].station, "STA2");
        assert_eq!(set.sorted_by.as_deref(), Some("distance"));
    }

    #[test]
    fn trace_end_time_spans_samples() {
        let tr = trace(101);
        assert_eq!(
            tr.end_time(),
            tr.start_time + chrono::Duration::milliseconds(1000)
        );
    }
}
