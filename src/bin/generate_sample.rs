use std::sync::Arc;

use arrow::array::{Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Gaussian-enveloped sine burst, the classic synthetic body-wave arrival.
fn wavelet(t: f64, onset: f64, freq: f64, sigma: f64, amplitude: f64) -> f64 {
    let dt = t - onset;
    amplitude
        * (-dt.powi(2) / (2.0 * sigma.powi(2))).exp()
        * (2.0 * std::f64::consts::PI * freq * dt).sin()
}

fn generate_trace(
    n: usize,
    delta: f64,
    p_onset: f64,
    s_onset: f64,
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64 * delta;
            wavelet(t, p_onset, 4.0, 0.4, 1.0)
                + wavelet(t, s_onset, 2.0, 0.8, 1.8)
                + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() {
    let mut rng = SimpleRng::new(42);

    let delta = 0.02; // 50 Hz
    let n_samples = 1500; // 30 s

    // (station, lat, lon, elevation, epicentral distance km)
    let stations = [
        ("ROTH", 46.21, 7.52, 1520.0, 12.4),
        ("WIMI", 46.05, 7.31, 980.0, 21.7),
        ("GRYO", 46.38, 7.80, 2210.0, 35.2),
        ("BALM", 46.12, 7.95, 1105.0, 48.9),
    ];
    let components = ["BHZ", "BHN", "BHE"];

    let mut all_samples: Vec<Vec<f64>> = Vec::new();
    let mut all_network: Vec<String> = Vec::new();
    let mut all_station: Vec<String> = Vec::new();
    let mut all_channel: Vec<String> = Vec::new();
    let mut all_location: Vec<String> = Vec::new();
    let mut all_starttime: Vec<String> = Vec::new();
    let mut all_delta: Vec<f64> = Vec::new();
    let mut all_lat: Vec<f64> = Vec::new();
    let mut all_lon: Vec<f64> = Vec::new();
    let mut all_elev: Vec<f64> = Vec::new();
    let mut all_distance: Vec<f64> = Vec::new();

    for &(station, lat, lon, elevation, distance_km) in &stations {
        // Crude travel times: vp ≈ 6 km/s, vs ≈ vp / 1.73.
        let p_onset = 5.0 + distance_km / 6.0;
        let s_onset = 5.0 + distance_km / (6.0 / 1.73);

        for channel in components {
            all_samples.push(generate_trace(
                n_samples, delta, p_onset, s_onset, 0.08, &mut rng,
            ));
            all_network.push("XP".to_string());
            all_station.push(station.to_string());
            all_channel.push(channel.to_string());
            all_location.push("00".to_string());
            all_starttime.push("2024-03-01T11:59:40Z".to_string());
            all_delta.push(delta);
            all_lat.push(lat);
            all_lon.push(lon);
            all_elev.push(elevation);
            all_distance.push(distance_km);
        }
    }

    // Build Arrow arrays
    let mut samples_builder = ListBuilder::new(Float64Builder::new());
    for row in &all_samples {
        let values = samples_builder.values();
        for &v in row {
            values.append_value(v);
        }
        samples_builder.append(true);
    }
    let samples_array = samples_builder.finish();

    let string_array =
        |v: &[String]| StringArray::from(v.iter().map(|s| s.as_str()).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new(
            "samples",
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        ),
        Field::new("network", DataType::Utf8, false),
        Field::new("station", DataType::Utf8, false),
        Field::new("channel", DataType::Utf8, false),
        Field::new("location", DataType::Utf8, false),
        Field::new("starttime", DataType::Utf8, false),
        Field::new("delta", DataType::Float64, false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("elevation", DataType::Float64, false),
        Field::new("distance_km", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(samples_array),
            Arc::new(string_array(&all_network)),
            Arc::new(string_array(&all_station)),
            Arc::new(string_array(&all_channel)),
            Arc::new(string_array(&all_location)),
            Arc::new(string_array(&all_starttime)),
            Arc::new(Float64Array::from(all_delta)),
            Arc::new(Float64Array::from(all_lat)),
            Arc::new(Float64Array::from(all_lon)),
            Arc::new(Float64Array::from(all_elev)),
            Arc::new(Float64Array::from(all_distance)),
        ],
    )
    .expect("Failed to create RecordBatch");

    // Write Parquet
    let output_path = "sample_waveforms.parquet";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {} traces ({} stations, {n_samples} samples each) to {output_path}",
        all_samples.len(),
        stations.len()
    );
}
