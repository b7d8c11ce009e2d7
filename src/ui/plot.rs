use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, MarkerShape, Plot, PlotPoints, Points, VLine};

use crate::color::faded;
use crate::state::AppState;
use crate::ui::{SeriesView, UiState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Rescale to `[0, 1]`; a flat trace maps to zeros.
pub fn minmax(values: &[f64]) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range.abs() < f64::EPSILON {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| (v - min) / range).collect()
}

/// Pair up `x` and `y`, dropping non-finite points.
fn points(x: &[f64], y: &[f64]) -> PlotPoints<'static> {
    x.iter()
        .zip(y)
        .filter(|(_, yi)| yi.is_finite())
        .map(|(&xi, &yi)| [xi, yi])
        .collect()
}

fn indexed(y: &[f64]) -> PlotPoints<'static> {
    y.iter()
        .enumerate()
        .filter(|(_, yi)| yi.is_finite())
        .map(|(i, &yi)| [i as f64, yi])
        .collect()
}

fn trace(name: &str, x: &[f64], y: &[f64], color: Color32, scale: bool) -> Line<'static> {
    let pts = if scale { points(x, &minmax(y)) } else { points(x, y) };
    Line::new(pts).name(name).color(color).width(1.5)
}

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Spectrum, transmission and the selected run series stacked vertically.
pub fn central_plots(ui: &mut Ui, state: &AppState, view: &mut UiState) {
    if state.latest.is_none() && state.tracker.run().is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Start acquisition to view spectra");
        });
        return;
    }
    let height = (ui.available_height() - 40.0).max(120.0) / 3.0;
    spectrum_plot(ui, state, view, height);
    transmission_plot(ui, state, view, height);
    ui.horizontal(|ui: &mut Ui| {
        for v in SeriesView::ALL {
            ui.selectable_value(&mut view.series_view, v, v.label());
        }
    });
    series_plot(ui, state, view, height);
}

/// Live spectrum with the loaded dark and reference baselines.
pub fn spectrum_plot(ui: &mut Ui, state: &AppState, view: &UiState, height: f32) {
    let scale = view.minmax_scaling;
    let palette = &view.palette;

    Plot::new("spectrum_plot")
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Wavelength (nm)")
        .y_axis_label(if scale { "Intensity (scaled)" } else { "Intensity" })
        .show(ui, |plot_ui| {
            let baselines = [
                ("Dark", state.baselines.dark(), palette.dark),
                ("Reference", state.baselines.reference(), palette.reference),
            ];
            for (name, spectrum, color) in baselines {
                if let Some(s) = spectrum {
                    plot_ui.line(trace(name, s.wavelengths(), s.smoothed(), color, scale));
                }
            }
            if let Some(bands) = state.tracker.params().band_ratio {
                for band in [bands.first, bands.second] {
                    plot_ui.vline(VLine::new(band.position).name("Bands").color(palette.marker));
                    for edge in [band.position - band.half_width, band.position + band.half_width] {
                        plot_ui.vline(VLine::new(edge).name("Bands").color(faded(palette.marker)));
                    }
                }
            }
            if let Some(live) = &state.latest {
                plot_ui.line(trace("Live", live.wavelengths(), live.raw(), faded(palette.live), scale));
                plot_ui.line(trace(
                    "Live (smooth)",
                    live.wavelengths(),
                    live.smoothed(),
                    palette.live,
                    scale,
                ));
            }
        });
}

/// Transmission curve with the centroid, fixed position and area window.
pub fn transmission_plot(ui: &mut Ui, state: &AppState, view: &UiState, height: f32) {
    let palette = &view.palette;
    let params = state.tracker.params();

    Plot::new("transmission_plot")
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Wavelength (nm)")
        .y_axis_label("Transmission (%)")
        .show(ui, |plot_ui| {
            let Some(curve) = &state.curve else {
                return;
            };
            plot_ui.line(trace(
                "Transmission",
                &curve.wavelengths,
                &curve.ratio,
                palette.transmission,
                false,
            ));
            plot_ui.vline(
                VLine::new(params.fixed_position)
                    .name("Fixed position")
                    .color(palette.marker),
            );
            if state.tracker.is_started() {
                for edge in [params.area_low, params.area_high] {
                    plot_ui.vline(VLine::new(edge).name("Area window").color(faded(palette.marker)));
                }
            }
            if let Some(s) = state.tracker.last_sample() {
                plot_ui.points(
                    Points::new(vec![[s.centroid_x, s.centroid_y]])
                        .name("Centroid")
                        .shape(MarkerShape::Diamond)
                        .radius(5.0)
                        .color(palette.centroid),
                );
            }
        });
}

/// One run series against tick number.
pub fn series_plot(ui: &mut Ui, state: &AppState, view: &UiState, height: f32) {
    let palette = &view.palette;
    let run = state.tracker.run();
    let (raw, smoothed, unit): (&[f64], Option<&[f64]>, &str) = match view.series_view {
        SeriesView::Centroid => (run.centroids(), Some(run.centroids_smoothed()), "nm"),
        SeriesView::Intensity => (run.intensities(), Some(run.intensities_smoothed()), "%"),
        SeriesView::Minimum => (run.minima(), None, "nm"),
        SeriesView::AreaRatio => (run.area_ratios(), None, "%"),
        SeriesView::BandIntensity => (run.band_intensity_ratios(), None, "%"),
        SeriesView::BandArea => (run.band_area_ratios(), None, "%"),
    };
    let label = view.series_view.label();

    Plot::new("series_plot")
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Tick")
        .y_axis_label(format!("{label} ({unit})"))
        .show(ui, |plot_ui| {
            let color = palette.centroid;
            match smoothed {
                Some(smooth) => {
                    plot_ui.line(Line::new(indexed(raw)).name(label).color(faded(color)));
                    plot_ui.line(
                        Line::new(indexed(smooth))
                            .name(format!("{label} (smooth)"))
                            .color(color)
                            .width(2.0),
                    );
                }
                None => plot_ui.line(Line::new(indexed(raw)).name(label).color(color).width(1.5)),
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minmax_scaling() {
        assert_eq!(minmax(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(minmax(&[5.0, 5.0]), vec![0.0, 0.0]);
        let scaled = minmax(&[0.0, f64::NAN, 10.0]);
        assert_eq!(scaled[2], 1.0);
        assert!(scaled[1].is_nan());
        assert_eq!(minmax(&[f64::NAN]), vec![0.0]);
    }

    #[test]
    fn test_points_owned_and_finite() {
        let pts = {
            let x = vec![500.0, 501.0, 502.0];
            let y = vec![90.0, f64::NAN, 80.0];
            points(&x, &y)
        };
        assert_eq!(pts.points().len(), 2);
        assert_eq!(indexed(&[1.0, f64::INFINITY, 3.0]).points().len(), 2);

        // Traces outlive the slices they were built from.
        let _line: Line<'static> = {
            let x = vec![1.0, 2.0];
            trace("t", &x, &[3.0, 4.0], Color32::WHITE, true)
        };
    }
}
