use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeListArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, StationSet, Trace, TraceHeader};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a waveform dataset from a file. Dispatch by extension.
///
/// Each row is one trace. Required fields: `network`, `station`, `channel`
/// (strings) and `samples` (float array). Recognized optional fields:
/// `location` (default empty), `starttime` (RFC 3339, default epoch),
/// `delta` (seconds, default 0.01), `latitude`/`longitude`/`elevation`
/// (default 0). Any other field becomes a station attribute.
///
/// Supported formats:
/// * `.parquet` – `samples` as a List column, headers as scalar columns
/// * `.json`    – `[{ "samples": [...], "network": "...", ... }, ...]`
/// * `.csv`     – `samples` column holds semicolon-separated floats
pub fn load_file(path: &Path) -> Result<StationSet> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// Row assembly, shared by all three formats
// ---------------------------------------------------------------------------

fn take_string(
    metadata: &mut BTreeMap<String, MetadataValue>,
    key: &str,
) -> Option<String> {
    let value = metadata.remove(key)?;
    match value {
        MetadataValue::String(s) | MetadataValue::Date(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn take_f64(metadata: &mut BTreeMap<String, MetadataValue>, key: &str) -> Option<f64> {
    metadata.remove(key).and_then(|v| v.as_f64())
}

/// Split one parsed row into the station header and its trace. Header fields
/// are removed from the metadata map; the remainder stays as attributes.
fn build_row(
    samples: Vec<f64>,
    mut metadata: BTreeMap<String, MetadataValue>,
    row: usize,
) -> Result<(TraceHeader, Trace)> {
    let network = take_string(&mut metadata, "network")
        .with_context(|| format!("Row {row}: missing 'network'"))?;
    let station = take_string(&mut metadata, "station")
        .with_context(|| format!("Row {row}: missing 'station'"))?;
    let channel = take_string(&mut metadata, "channel")
        .with_context(|| format!("Row {row}: missing 'channel'"))?;
    let location = take_string(&mut metadata, "location").unwrap_or_default();

    let start_time = match take_string(&mut metadata, "starttime") {
        Some(text) => DateTime::parse_from_rfc3339(&text)
            .with_context(|| format!("Row {row}: invalid 'starttime' {text:?}"))?
            .with_timezone(&Utc),
        None => DateTime::<Utc>::UNIX_EPOCH,
    };
    let delta = take_f64(&mut metadata, "delta").unwrap_or(0.01);
    if delta <= 0.0 {
        bail!("Row {row}: 'delta' must be positive");
    }
    let latitude = take_f64(&mut metadata, "latitude").unwrap_or(0.0);
    let longitude = take_f64(&mut metadata, "longitude").unwrap_or(0.0);
    let elevation = take_f64(&mut metadata, "elevation").unwrap_or(0.0);

    Ok((
        TraceHeader {
            network,
            station,
            location,
            channel,
            latitude,
            longitude,
            elevation,
            metadata,
        },
        Trace {
            start_time,
            delta,
            samples,
        },
    ))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<StationSet> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let samples = json_array_to_f64(obj.get("samples"), i)?;

        let mut metadata = BTreeMap::new();
        for (key, val) in obj {
            if key == "samples" {
                continue;
            }
            metadata.insert(key.clone(), json_to_metadata(val));
        }
        rows.push(build_row(samples, metadata, i)?);
    }

    Ok(StationSet::from_traces(rows))
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid 'samples' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, samples[{j}]: not a number"))
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names; the `samples` column contains
/// semicolon-separated floats: `"0.12;0.14;0.11"`.
fn load_csv(path: &Path) -> Result<StationSet> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let samples_idx = headers
        .iter()
        .position(|h| h == "samples")
        .context("CSV missing 'samples' column")?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let samples =
            parse_semicolon_floats(record.get(samples_idx).unwrap_or(""), row_no)?;

        let mut metadata = BTreeMap::new();
        for (col_idx, value) in record.iter().enumerate() {
            if col_idx == samples_idx {
                continue;
            }
            let col_name = &headers[col_idx];
            metadata.insert(col_name.clone(), guess_metadata_type(col_name, value));
        }
        rows.push(build_row(samples, metadata, row_no)?);
    }

    Ok(StationSet::from_traces(rows))
}

fn parse_semicolon_floats(s: &str, row: usize) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, samples[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_metadata_type(column: &str, s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    // Identity columns stay text even when they look numeric ("01", "7").
    if matches!(
        column,
        "network" | "station" | "location" | "channel" | "starttime"
    ) {
        return MetadataValue::String(s.to_string());
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet waveform file.
///
/// Expected schema:
/// - `samples`: List<Float64> or LargeList<Float64> (Float32 accepted)
/// - scalar header/attribute columns (strings, ints, floats, bools)
fn load_parquet(path: &Path) -> Result<StationSet> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    let mut row_no = 0usize;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let samples_idx = schema
            .index_of("samples")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'samples' column"))?;
        let samples_col = batch.column(samples_idx);

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != samples_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..batch.num_rows() {
            let samples = extract_f64_list(samples_col, row)
                .with_context(|| format!("Row {row_no}: failed to read 'samples'"))?;

            let mut metadata = BTreeMap::new();
            for (col_idx, col_name) in &meta_cols {
                let value = extract_metadata_value(batch.column(*col_idx), row);
                metadata.insert(col_name.clone(), value);
            }
            rows.push(build_row(samples, metadata, row_no)?);
            row_no += 1;
        }
    }

    Ok(StationSet::from_traces(rows))
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single header/attribute value from an Arrow column.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
                MetadataValue::String(s.value(row).to_string())
            } else {
                // LargeStringArray
                let s = col.as_string::<i64>();
                MetadataValue::String(s.value(row).to_string())
            }
        }
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>().unwrap();
            MetadataValue::Integer(arr.value(row) as i64)
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>().unwrap();
            MetadataValue::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>().unwrap();
            MetadataValue::Float(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>().unwrap();
            MetadataValue::Float(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col.as_any().downcast_ref::<BooleanArray>().unwrap();
            MetadataValue::Bool(arr.value(row))
        }
        _ => MetadataValue::String(format!("{:?}", col.data_type())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("wavepick_{}_{name}", std::process::id()))
    }

    #[test]
    fn json_rows_load_and_group_into_stations() {
        let path = temp_path("waves.json");
        std::fs::write(
            &path,
            r#"[{"samples": [0.0, 1.0, -1.0], "network": "XX", "station": "STA1",
                "channel": "BHZ", "location": "00",
                "starttime": "2024-03-01T00:00:00Z", "delta": 0.01,
                "latitude": 46.1, "longitude": 7.2, "elevation": 550.0,
                "sensor": "STS-2"},
               {"samples": [0.5, 0.25], "network": "XX", "station": "STA1",
                "channel": "BHN", "location": "00",
                "starttime": "2024-03-01T00:00:00Z", "delta": 0.01,
                "latitude": 46.1, "longitude": 7.2, "elevation": 550.0,
                "sensor": "STS-2"}]"#,
        )
        .unwrap();

        let set = load_file(&path).unwrap();
        assert_eq!(set.len(), 1);
        let station = &set.stations[0];
        assert_eq!(station.channels.len(), 2);
        assert_eq!(station.latitude, 46.1);
        assert_eq!(station.channels[0].trace.delta, 0.01);
        assert_eq!(station.channels[0].trace.samples, vec![0.0, 1.0, -1.0]);
        // Non-header fields stay as attributes.
        assert_eq!(
            station.metadata.get("sensor"),
            Some(&MetadataValue::String("STS-2".to_string()))
        );
        assert!(!station.metadata.contains_key("network"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn csv_samples_cell_holds_semicolon_separated_floats() {
        let path = temp_path("waves.csv");
        std::fs::write(
            &path,
            "network,station,channel,location,delta,samples\n\
             XX,STA1,BHZ,00,0.01,0.0;1.0;-0.5\n",
        )
        .unwrap();

        let set = load_file(&path).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.stations[0].channels[0].trace.samples,
            vec![0.0, 1.0, -0.5]
        );
        // Default header values for columns the file omits.
        assert_eq!(set.stations[0].latitude, 0.0);
        assert_eq!(
            set.stations[0].channels[0].trace.start_time,
            DateTime::<Utc>::UNIX_EPOCH
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_required_header_names_the_row() {
        let path = temp_path("no_station.json");
        std::fs::write(
            &path,
            r#"[{"samples": [0.0], "network": "XX", "channel": "BHZ"}]"#,
        )
        .unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Row 0"), "err was: {err:#}");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        assert!(load_file(Path::new("waves.mseed")).is_err());
    }
}
