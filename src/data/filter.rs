use std::f64::consts::{FRAC_1_SQRT_2, PI};

// ---------------------------------------------------------------------------
// Bandpass configuration
// ---------------------------------------------------------------------------

/// Rendering-time bandpass specification. Either absent (no filtering) or
/// fully populated; stored samples are never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandpassConfig {
    /// Lower corner frequency in Hz.
    pub freqmin: f64,
    /// Upper corner frequency in Hz.
    pub freqmax: f64,
    /// Butterworth order; every two orders add one biquad section per edge.
    pub corners: u32,
    /// Run the cascade forward and backward to cancel phase shift.
    pub zerophase: bool,
}

impl Default for BandpassConfig {
    fn default() -> Self {
        BandpassConfig {
            freqmin: 1.0,
            freqmax: 10.0,
            corners: 4,
            zerophase: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Biquad sections (Audio EQ Cookbook)
// ---------------------------------------------------------------------------

/// Second-order IIR coefficients, normalized by a0.
/// H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn low_pass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Biquad {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        Biquad {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn high_pass(cutoff_hz: f64, q: f64, sample_rate: f64) -> Biquad {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        Biquad {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Direct form I, in place.
    fn run(&self, samples: &mut [f64]) {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        for sample in samples.iter_mut() {
            let x = *sample;
            let y = self.b0 * x + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = y;
            *sample = y;
        }
    }
}

// ---------------------------------------------------------------------------
// Bandpass
// ---------------------------------------------------------------------------

/// Bandpass a trace for rendering.
///
/// Butterworth-style: cascaded high-pass sections at `freqmin` and low-pass
/// sections at `freqmax`, Q = 1/√2 each; `corners` is the nominal order, two
/// per section. With `zerophase` the cascade runs forward and backward,
/// doubling the effective order. The input slice is left untouched.
pub fn bandpass(samples: &[f64], delta: f64, config: &BandpassConfig) -> Vec<f64> {
    let sample_rate = 1.0 / delta;
    let sections = (config.corners.div_ceil(2)).max(1);

    let mut out = samples.to_vec();
    let cascade: Vec<Biquad> = (0..sections)
        .flat_map(|_| {
            [
                Biquad::high_pass(config.freqmin, FRAC_1_SQRT_2, sample_rate),
                Biquad::low_pass(config.freqmax, FRAC_1_SQRT_2, sample_rate),
            ]
        })
        .collect();

    for section in &cascade {
        section.run(&mut out);
    }
    if config.zerophase {
        out.reverse();
        for section in &cascade {
            section.run(&mut out);
        }
        out.reverse();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_hz: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate).sin())
            .collect()
    }

    fn rms(samples: &[f64]) -> f64 {
        (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
    }

    const CONFIG: BandpassConfig = BandpassConfig {
        freqmin: 1.0,
        freqmax: 10.0,
        corners: 4,
        zerophase: false,
    };

    #[test]
    fn in_band_tone_passes() {
        let input = sine(5.0, 100.0, 4000);
        let output = bandpass(&input, 0.01, &CONFIG);
        // Skip the transient at the head.
        assert!(rms(&output[1000..]) > 0.6 * rms(&input[1000..]));
    }

    #[test]
    fn out_of_band_tones_attenuate() {
        let low = sine(0.05, 100.0, 4000);
        let high = sine(45.0, 100.0, 4000);
        let low_out = bandpass(&low, 0.01, &CONFIG);
        let high_out = bandpass(&high, 0.01, &CONFIG);
        assert!(rms(&low_out[1000..]) < 0.1 * rms(&low[1000..]));
        assert!(rms(&high_out[1000..]) < 0.1 * rms(&high[1000..]));
    }

    #[test]
    fn zerophase_keeps_length_and_leaves_input_untouched() {
        let input = sine(5.0, 100.0, 512);
        let reference = input.clone();
        let config = BandpassConfig {
            zerophase: true,
            ..CONFIG
        };
        let output = bandpass(&input, 0.01, &config);
        assert_eq!(output.len(), input.len());
        assert_eq!(input, reference);
    }

    #[test]
    fn odd_corner_counts_round_up_to_a_full_section() {
        let input = sine(5.0, 100.0, 1024);
        let config = BandpassConfig {
            corners: 1,
            ..CONFIG
        };
        let output = bandpass(&input, 0.01, &config);
        assert_eq!(output.len(), input.len());
        assert!(rms(&output[256..]) > 0.0);
    }
}
