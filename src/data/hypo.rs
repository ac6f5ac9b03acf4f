use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use super::model::{Station, StationSet};

// ---------------------------------------------------------------------------
// Hypoinverse station data format #1
// ---------------------------------------------------------------------------

/// One station as the legacy hypocenter-location program expects it
/// (Hypoinverse documentation p. 28, "station data format #1").
///
/// Fields not derivable from a [`Station`] carry the format's documented
/// defaults; all widths are fixed, so [`HypoStation::line`] always renders
/// the same number of columns.
#[derive(Debug, Clone)]
pub struct HypoStation {
    pub name: String,
    pub network: String,
    pub component_code: String,
    pub channel_code: String,
    /// `'f'` is full weight.
    pub weight: char,
    /// Decimal degrees, north positive.
    pub latitude: f64,
    /// Decimal degrees, east positive.
    pub longitude: f64,
    /// Meters, written as a 4-column integer.
    pub elevation: f64,
    /// Seconds.
    pub default_period: f64,
    pub use_alternate_crust_model: bool,
    pub remark: String,
    /// P delay in seconds for delay set 1.
    pub p_delay_1: f64,
    /// P delay in seconds for delay set 2.
    pub p_delay_2: f64,
    pub amplitude_correction: f64,
    pub amplitude_weight: String,
    pub duration_magnitude_correction: f64,
    pub duration_magnitude_weight: String,
    pub instrument_type: u8,
    /// Never 0; the format treats 0 as "uncalibrated".
    pub calibration_factor: f64,
    pub location: String,
    pub alternate_component_code: String,
    pub mark_negative_depth: bool,
}

impl Default for HypoStation {
    fn default() -> Self {
        HypoStation {
            name: String::new(),
            network: String::new(),
            component_code: String::new(),
            channel_code: String::new(),
            weight: 'f',
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0.0,
            default_period: 2.0,
            use_alternate_crust_model: false,
            remark: String::new(),
            p_delay_1: 0.0,
            p_delay_2: 0.0,
            amplitude_correction: 1.0,
            amplitude_weight: String::new(),
            duration_magnitude_correction: 0.0,
            duration_magnitude_weight: String::new(),
            instrument_type: 0,
            calibration_factor: 1.4,
            location: String::new(),
            alternate_component_code: String::new(),
            mark_negative_depth: false,
        }
    }
}

/// Decimal degrees → (whole degrees, decimal minutes), sign dropped.
///
/// The hemisphere letter carries the sign. Exact at the minute's 4-decimal
/// precision: `37.5 → (37, 30.0)`.
pub fn deg_to_deg_min(value: f64) -> (u32, f64) {
    let value = value.abs();
    let degrees = value.trunc() as u32;
    (degrees, value.fract() * 60.0)
}

impl HypoStation {
    /// Identity and coordinates from a loaded station, defaults elsewhere.
    pub fn from_station(station: &Station) -> HypoStation {
        HypoStation {
            name: station.station.clone(),
            network: station.network.clone(),
            location: station.location.clone(),
            latitude: station.latitude,
            longitude: station.longitude,
            elevation: station.elevation,
            ..HypoStation::default()
        }
    }

    /// Render the fixed-column line. Pure; no I/O.
    pub fn line(&self) -> String {
        let (lat_deg, lat_min) = deg_to_deg_min(self.latitude);
        let (lon_deg, lon_min) = deg_to_deg_min(self.longitude);
        let lat_hemisphere = if self.latitude > 0.0 { 'N' } else { 'S' };
        let lon_hemisphere = if self.longitude > 0.0 { 'E' } else { 'W' };

        let mut line = String::with_capacity(90);
        // Station name / network / component / channel
        line.push_str(&format!("{:>5} ", self.name));
        line.push_str(&format!("{:>2} ", self.network));
        line.push_str(&format!("{:>1}", self.component_code));
        line.push_str(&format!("{:>3} ", self.channel_code));
        line.push(self.weight);
        // Coordinates in degrees + decimal minutes
        line.push_str(&format!("{lat_deg:2} {lat_min:7.4}{lat_hemisphere}"));
        line.push_str(&format!("{lon_deg:3} {lon_min:7.4}{lon_hemisphere}"));
        line.push_str(&format!("{:4}", self.elevation as i64));
        line.push_str(&format!("{:3.1}  ", self.default_period));
        line.push_str(if self.use_alternate_crust_model { "A" } else { " " });
        line.push_str(&format!("{:>1}", self.remark));
        // Delays and corrections
        line.push_str(&format!("{:5.2} ", self.p_delay_1));
        line.push_str(&format!("{:5.2} ", self.p_delay_2));
        line.push_str(&format!("{:5.2}", self.amplitude_correction));
        line.push_str(&format!("{:>1}", self.amplitude_weight));
        line.push_str(&format!("{:5.2}", self.duration_magnitude_correction));
        line.push_str(&format!("{:>1}", self.duration_magnitude_weight));
        line.push_str(&format!("{:1}", self.instrument_type));
        line.push_str(&format!("{:6.2}", self.calibration_factor));
        line.push_str(&format!("{:>2}", self.location));
        line.push_str(&format!("{:>3}", self.alternate_component_code));
        line.push_str(if self.mark_negative_depth { "-" } else { " " });
        line
    }
}

/// Write one fixed-width line per station, newline-terminated.
pub fn write_station_file(path: &Path, stations: &StationSet) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for station in stations.iter() {
        writeln!(file, "{}", HypoStation::from_station(station).line())
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{StationSet, Trace, TraceHeader};
    use std::collections::BTreeMap;

    const LINE_LEN: usize = 86;

    fn entry(lat: f64, lon: f64) -> HypoStation {
        HypoStation {
            name: "STA1".to_string(),
            network: "XX".to_string(),
            latitude: lat,
            longitude: lon,
            elevation: 120.0,
            ..HypoStation::default()
        }
    }

    #[test]
    fn degrees_convert_to_degrees_and_decimal_minutes() {
        assert_eq!(deg_to_deg_min(37.5), (37, 30.0));
        assert_eq!(deg_to_deg_min(-12.25), (12, 15.0));
        assert_eq!(deg_to_deg_min(0.0), (0, 0.0));
    }

    #[test]
    fn conversion_round_trips_at_minute_precision() {
        for &value in &[37.5, -12.25, 47.123456, -0.9999, 179.987654] {
            let (deg, min) = deg_to_deg_min(value);
            // Re-encode from the 4-decimal rendering the codec writes.
            let rendered: f64 = format!("{min:.4}").parse().unwrap();
            let back = (deg as f64 + rendered / 60.0) * value.signum();
            assert!(
                (back - value).abs() < 1e-6,
                "{value} -> {deg} {min:.4} -> {back}"
            );
        }
    }

    #[test]
    fn hemisphere_letters_carry_the_sign() {
        let north = entry(37.5, 8.0).line();
        assert!(north.contains("37 30.0000N"), "line was: {north:?}");
        assert!(north.contains("  8  0.0000E"), "line was: {north:?}");

        let south = entry(-12.25, -122.125).line();
        assert!(south.contains("12 15.0000S"), "line was: {south:?}");
        assert!(south.contains("122  7.5000W"), "line was: {south:?}");
    }

    #[test]
    fn line_length_is_constant_across_inputs() {
        let lines = [
            entry(37.5, 8.0).line(),
            entry(-12.25, -122.125).line(),
            entry(0.0, 0.0).line(),
            HypoStation {
                name: "A".to_string(),
                network: "Z".to_string(),
                channel_code: "BHZ".to_string(),
                component_code: "Z".to_string(),
                use_alternate_crust_model: true,
                remark: "r".to_string(),
                elevation: 1234.0,
                p_delay_1: 1.25,
                p_delay_2: -0.5,
                instrument_type: 3,
                mark_negative_depth: true,
                ..HypoStation::default()
            }
            .line(),
        ];
        for line in &lines {
            assert_eq!(line.len(), LINE_LEN, "line was: {line:?}");
        }
    }

    #[test]
    fn defaults_follow_the_documented_format() {
        let line = entry(37.5, 8.0).line();
        // weight 'f' right after the padded channel columns
        assert_eq!(&line[14..15], "f");
        // default period 2.0, calibration 1.40 (never 0), amp correction 1.00
        assert!(line.contains("2.0  "), "line was: {line:?}");
        assert!(line.contains("  1.40"), "line was: {line:?}");
        assert!(line.contains(" 1.00"), "line was: {line:?}");
    }

    #[test]
    fn station_file_writes_one_line_per_station() {
        let header = |sta: &str| TraceHeader {
            network: "XX".to_string(),
            station: sta.to_string(),
            location: "00".to_string(),
            channel: "BHZ".to_string(),
            latitude: 37.5,
            longitude: 8.0,
            elevation: 120.0,
            metadata: BTreeMap::new(),
        };
        let trace = Trace {
            start_time: chrono::DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
            delta: 0.01,
            samples: vec![0.0; 8],
        };
        let set = StationSet::from_traces(vec![
            (header("STA1"), trace.clone()),
            (header("STA2"), trace),
        ]);

        let path = std::env::temp_dir().join(format!("wavepick_{}_stations.sta", std::process::id()));
        write_station_file(&path, &set).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == LINE_LEN));
        std::fs::remove_file(&path).unwrap();
    }
}
