use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::picks::Phase;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
/// Used for per-station trace colours.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.45, 0.60);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Phase colors
// ---------------------------------------------------------------------------

/// Line colour of a phase marker.
pub fn phase_color(phase: Phase) -> Color32 {
    match phase {
        Phase::P => Color32::from_rgb(220, 60, 60),
        Phase::S => Color32::from_rgb(60, 180, 75),
        Phase::Amp => Color32::from_rgb(70, 130, 240),
        Phase::M1 => Color32::from_rgb(230, 200, 50),
        Phase::M2 => Color32::from_rgb(235, 235, 235),
    }
}

/// Semi-transparent fill used to highlight picks of the active event.
pub fn phase_fill(phase: Phase) -> Color32 {
    let c = phase_color(phase);
    Color32::from_rgba_unmultiplied(c.r(), c.g(), c.b(), 100)
}
