use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Same hue, lighter: used for the raw trace behind its smoothed version.
pub fn faded(color: Color32) -> Color32 {
    color.gamma_multiply(0.45)
}

// ---------------------------------------------------------------------------
// Trace colours
// ---------------------------------------------------------------------------

/// One colour per plotted quantity, stable across frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePalette {
    pub dark: Color32,
    pub reference: Color32,
    pub live: Color32,
    pub transmission: Color32,
    pub centroid: Color32,
    pub marker: Color32,
}

impl Default for TracePalette {
    fn default() -> Self {
        let p = generate_palette(6);
        Self {
            dark: p[4],
            reference: p[1],
            live: p[0],
            transmission: p[3],
            centroid: p[2],
            marker: p[5],
        }
    }
}
