use std::time::Instant;

use chrono::Local;
use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};

use crate::data::export::ExportFormat;
use crate::data::loader::results_name;
use crate::device::{Scene, Spectrometer};
use crate::pipeline::baseline::{BaselineKind, MAX_SPECTRAL_SIGMA};
use crate::pipeline::tracker::{Band, BandRatioParams, MAX_SERIES_SIGMA, TickOutcome};
use crate::state::AppState;
use crate::ui::UiState;

// ---------------------------------------------------------------------------
// Left side panel – acquisition and time-series controls
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState, view: &mut UiState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            acquisition_section(ui, state, view);
            ui.separator();
            baseline_section(ui, state);
            ui.separator();
            tracking_section(ui, state, view);
            ui.separator();
            readouts(ui, state);
        });
}

fn acquisition_section(ui: &mut Ui, state: &mut AppState, view: &mut UiState) {
    ui.heading("Acquisition");
    ui.label(state.device.name());

    egui::Grid::new("acquisition_grid")
        .num_columns(2)
        .show(ui, |ui: &mut Ui| {
            let acq = &mut view.draft.acquisition;
            ui.label("Integration time");
            ui.add(
                DragValue::new(&mut acq.integration_time_ms)
                    .range(1..=60_000)
                    .suffix(" ms"),
            );
            ui.end_row();
            ui.label("Sample period");
            ui.add(
                DragValue::new(&mut acq.sample_period_ms)
                    .range(1..=3_600_000)
                    .suffix(" ms"),
            );
            ui.end_row();

            let processing = &mut view.draft.processing;
            ui.label("Spectral sigma");
            ui.add(DragValue::new(&mut processing.spectral_sigma).range(0.0..=MAX_SPECTRAL_SIGMA));
            ui.end_row();
            ui.label("Window");
            ui.add(
                DragValue::new(&mut processing.transmission_window)
                    .range(1..=100_000)
                    .suffix(" px"),
            );
            ui.end_row();
        });

    ui.horizontal(|ui: &mut Ui| {
        if ui
            .add_enabled(!state.is_acquiring(), egui::Button::new("▶ Start"))
            .clicked()
        {
            // Integration time takes effect on a fresh device start.
            apply_draft(state, view);
            if let Err(e) = state.start_acquisition(Instant::now()) {
                state.report(Err(e.into()));
            }
        }
        if ui
            .add_enabled(state.is_acquiring(), egui::Button::new("⏸ Pause"))
            .clicked()
        {
            state.pause_acquisition();
        }
    });

    let current = state.device.scene();
    egui::ComboBox::from_id_salt("scene")
        .selected_text(format!("Scene: {current:?}"))
        .show_ui(ui, |ui: &mut Ui| {
            for scene in [Scene::Dark, Scene::Lamp, Scene::Sample] {
                if ui
                    .selectable_label(current == scene, format!("{scene:?}"))
                    .clicked()
                {
                    state.device.set_scene(scene);
                }
            }
        });
}

fn baseline_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Baselines");
    for kind in [BaselineKind::Dark, BaselineKind::Reference] {
        egui::CollapsingHeader::new(RichText::new(kind_label(kind)).strong())
            .id_salt(kind)
            .default_open(true)
            .show(ui, |ui: &mut Ui| baseline_picker(ui, state, kind));
    }
    if ui.small_button("⟳ Refresh lists").clicked() {
        state.refresh_file_lists();
    }
}

fn kind_label(kind: BaselineKind) -> &'static str {
    match kind {
        BaselineKind::Dark => "Dark",
        BaselineKind::Reference => "Bright",
    }
}

fn baseline_picker(ui: &mut Ui, state: &mut AppState, kind: BaselineKind) {
    let loaded = state.baselines.source(kind).map(|p| p.to_path_buf());
    let selected_text = loaded
        .as_deref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "none".to_string());

    let mut chosen = None;
    egui::ComboBox::from_id_salt(("baseline_files", kind))
        .selected_text(selected_text)
        .width(ui.available_width() * 0.9)
        .show_ui(ui, |ui: &mut Ui| {
            for path in state.files(kind) {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if ui
                    .selectable_label(loaded.as_deref() == Some(path.as_path()), name)
                    .clicked()
                {
                    chosen = Some(path.clone());
                }
            }
        });

    ui.horizontal(|ui: &mut Ui| {
        if ui
            .add_enabled(state.latest.is_some(), egui::Button::new("Capture"))
            .on_hover_text("Save the current reading into the folder")
            .clicked()
        {
            let result = state
                .capture_baseline(kind)
                .map(|p| format!("Captured {}", p.display()));
            state.report(result);
        }
        if ui.button("Open…").clicked() {
            chosen = open_spectrum_dialog(state, kind);
        }
    });

    if let Some(path) = chosen {
        let result = state
            .load_baseline(kind, &path)
            .map(|_| format!("Loaded {kind} spectrum {}", path.display()));
        state.report(result);
    }
}

fn tracking_section(ui: &mut Ui, state: &mut AppState, view: &mut UiState) {
    ui.heading("Time series");

    egui::Grid::new("tracking_grid")
        .num_columns(2)
        .show(ui, |ui: &mut Ui| {
            let t = &mut view.draft.tracking;
            ui.label("Centroid ± window");
            ui.add(DragValue::new(&mut t.centroid_half_window).speed(0.5).suffix(" nm"));
            ui.end_row();
            ui.label("Fixed position");
            ui.add(DragValue::new(&mut t.fixed_position).speed(0.5).suffix(" nm"));
            ui.end_row();
            ui.label("Area from");
            ui.add(DragValue::new(&mut t.area_low).speed(0.5).suffix(" nm"));
            ui.end_row();
            ui.label("Area to");
            ui.add(DragValue::new(&mut t.area_high).speed(0.5).suffix(" nm"));
            ui.end_row();
            ui.label("Series sigma");
            ui.add(DragValue::new(&mut t.series_sigma).range(0.0..=MAX_SERIES_SIGMA));
            ui.end_row();
        });

    let bands = &mut view.draft.tracking.band_ratio;
    let mut enabled = bands.is_some();
    if ui.checkbox(&mut enabled, "Two-band ratio").changed() {
        *bands = enabled.then(BandRatioParams::default);
    }
    if let Some(b) = bands {
        egui::Grid::new("band_grid")
            .num_columns(2)
            .show(ui, |ui: &mut Ui| {
                band_row(ui, "Band 1", &mut b.first);
                band_row(ui, "Band 2", &mut b.second);
            });
    }

    if ui.button("Apply settings").clicked() {
        apply_draft(state, view);
    }

    ui.horizontal(|ui: &mut Ui| {
        if ui
            .add_enabled(!state.is_tracking(), egui::Button::new("▶ Start"))
            .clicked()
        {
            apply_draft(state, view);
            let result = state
                .start_series(Instant::now())
                .map(|_| "Time series started".to_string())
                .map_err(anyhow::Error::from);
            state.report(result);
        }
        if ui
            .add_enabled(state.is_tracking(), egui::Button::new("⏸ Pause"))
            .clicked()
        {
            state.pause_series();
        }
        if ui.button("✖ Clear").clicked() {
            state.clear_series();
        }
    });

    let mut fixed = state.tracker.fix_minimum();
    if ui.checkbox(&mut fixed, "Fix minimum").changed() {
        state.tracker.set_fix_minimum(fixed);
    }

    ui.horizontal(|ui: &mut Ui| {
        ui.radio_value(&mut view.export_format, ExportFormat::Csv, "CSV");
        ui.radio_value(&mut view.export_format, ExportFormat::Parquet, "Parquet");
        ui.radio_value(&mut view.export_format, ExportFormat::Xlsx, "Excel");
        if ui.button("Export…").clicked() {
            export_dialog(state, view.export_format);
        }
    });
}

fn band_row(ui: &mut Ui, label: &str, band: &mut Band) {
    ui.label(label);
    ui.horizontal(|ui: &mut Ui| {
        ui.add(DragValue::new(&mut band.position).speed(0.5).suffix(" nm"));
        ui.label("±");
        ui.add(
            DragValue::new(&mut band.half_width)
                .speed(0.5)
                .range(0.1..=f64::MAX)
                .suffix(" nm"),
        );
    });
    ui.end_row();
}

fn readouts(ui: &mut Ui, state: &AppState) {
    ui.heading("Readout");
    let run = state.tracker.run();
    ui.label(format!(
        "{} samples, {} skipped",
        run.len(),
        state.skipped_ticks
    ));

    if let Some(TickOutcome::Skipped(reason)) = state.last_outcome {
        ui.label(RichText::new(format!("Last tick skipped: {reason}")).color(Color32::YELLOW));
    }

    let Some(s) = state.tracker.last_sample() else {
        return;
    };
    egui::Grid::new("readout_grid")
        .num_columns(2)
        .show(ui, |ui: &mut Ui| {
            for (label, value) in [
                ("Centroid", format!("{:.3} nm", s.centroid_x)),
                ("Centroid value", format!("{:.2} %", s.centroid_y)),
                ("Minimum", format!("{:.3} nm", s.minimum_wavelength)),
                ("Intensity", format!("{:.2} %", s.fixed_intensity)),
                ("Area ratio", format!("{:.2} %", s.area_ratio)),
            ] {
                ui.label(label);
                ui.monospace(value);
                ui.end_row();
            }
            if let Some(b) = s.bands {
                ui.label("Band intensity ratio");
                ui.monospace(format!("{:.2} %", b.intensity_ratio));
                ui.end_row();
                ui.label("Band area ratio");
                ui.monospace(format!("{:.2} %", b.area_ratio));
                ui.end_row();
            }
        });
}

fn apply_draft(state: &mut AppState, view: &mut UiState) {
    match state.apply_settings(view.draft.clone(), Instant::now()) {
        Ok(()) => log::info!("Settings applied"),
        Err(e) => {
            log::warn!("Rejected settings: {e}");
            state.status_message = Some(format!("Error: {e}"));
            view.draft = state.settings.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState, view: &mut UiState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Load settings…").clicked() {
                open_settings_dialog(state, view);
                ui.close_menu();
            }
            if ui.button("Save settings").clicked() {
                apply_draft(state, view);
                state.save_settings();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Export results…").clicked() {
                export_dialog(state, view.export_format);
                ui.close_menu();
            }
        });

        ui.separator();

        ui.label(format!(
            "{}  |  {}",
            if state.is_acquiring() { "acquiring" } else { "idle" },
            if state.is_tracking() { "tracking" } else { "paused" },
        ));

        ui.separator();

        if ui
            .selectable_label(view.minmax_scaling, "Min-Max Scaling")
            .clicked()
        {
            view.minmax_scaling = !view.minmax_scaling;
        }

        if let Some(msg) = &state.status_message {
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                ui.visuals().text_color()
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

fn open_spectrum_dialog(state: &AppState, kind: BaselineKind) -> Option<std::path::PathBuf> {
    rfd::FileDialog::new()
        .set_title(format!("Open {kind} spectrum"))
        .set_directory(state.folder(kind))
        .add_filter("Supported files", &["csv", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file()
}

fn open_settings_dialog(state: &mut AppState, view: &mut UiState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Load settings")
        .add_filter("JSON", &["json"])
        .pick_file()
    else {
        return;
    };
    let result = state
        .load_settings(&path, Instant::now())
        .map(|_| format!("Loaded settings {}", path.display()));
    state.report(result);
    view.draft = state.settings.clone();
}

pub fn export_dialog(state: &mut AppState, format: ExportFormat) {
    let Some(parent) = rfd::FileDialog::new()
        .set_title("Export results into folder")
        .set_directory(&state.settings.folders.results)
        .pick_folder()
    else {
        return;
    };
    let dir = parent.join(results_name(Local::now()));
    let result = state
        .export_results(&dir, format)
        .map(|files| format!("Exported {} files to {}", files.len(), dir.display()));
    state.report(result);
}
