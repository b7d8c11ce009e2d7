use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::{ConfigError, Settings};
use crate::data::export::{ExportFormat, ResultsInput, results_workbook, write_workbook};
use crate::data::loader::{capture_file_name, list_spectrum_files, load_spectrum, save_spectrum_csv};
use crate::data::model::{SampleGrid, SmoothedSpectrum};
use crate::device::{DeviceError, SimulatedSpectrometer, Spectrometer};
use crate::pipeline::baseline::{BaselineKind, BaselineStore};
use crate::pipeline::error::TrackerError;
use crate::pipeline::tracker::{FeatureTracker, TickOutcome};
use crate::pipeline::transmission::{TransmissionComputer, TransmissionCurve};
use crate::pipeline::{Tick, run_tick};
use crate::schedule::PeriodicTask;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The acquisition session, independent of rendering: device, baselines,
/// feature tracker and the two periodic tasks that drive them.
pub struct AppState<D: Spectrometer = SimulatedSpectrometer> {
    pub settings: Settings,
    pub settings_path: PathBuf,

    pub device: D,
    device_started: bool,

    pub baselines: BaselineStore,
    pub computer: TransmissionComputer,
    pub tracker: FeatureTracker,

    /// Device read timer (integration time).
    pub read_task: PeriodicTask,
    /// Feature-tracking timer (sample period).
    pub tick_task: PeriodicTask,

    /// Most recent live spectrum (smoothed for display).
    pub latest: Option<SmoothedSpectrum>,
    /// Transmission of `latest`, when baselines are ready.
    pub curve: Option<TransmissionCurve>,
    pub last_outcome: Option<TickOutcome>,
    pub skipped_ticks: u64,

    /// Baseline files available in the configured folders.
    pub dark_files: Vec<PathBuf>,
    pub bright_files: Vec<PathBuf>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Settings::default(), Settings::default_path(), SimulatedSpectrometer::default())
    }
}

impl<D: Spectrometer> AppState<D> {
    pub fn new(settings: Settings, settings_path: PathBuf, device: D) -> Self {
        let acq = &settings.acquisition;
        let read_task = PeriodicTask::new(
            "read",
            Duration::from_millis(u64::from(acq.integration_time_ms)),
        );
        let tick_task = PeriodicTask::new(
            "tick",
            Duration::from_millis(u64::from(acq.sample_period_ms)),
        );
        let processing = &settings.processing;
        let mut state = Self {
            baselines: BaselineStore::new(processing.spectral_sigma),
            computer: TransmissionComputer::new(processing.transmission_window, processing.spectral_sigma),
            tracker: FeatureTracker::new(settings.tracking),
            settings,
            settings_path,
            device,
            device_started: false,
            read_task,
            tick_task,
            latest: None,
            curve: None,
            last_outcome: None,
            skipped_ticks: 0,
            dark_files: Vec::new(),
            bright_files: Vec::new(),
            status_message: None,
        };
        state.refresh_file_lists();
        state
    }

    // ---- Settings ----

    /// Validate and adopt new settings. Timing and smoothing apply at once;
    /// tracking parameters apply at the next time-series start, integration
    /// time at the next acquisition start.
    pub fn apply_settings(&mut self, settings: Settings, now: Instant) -> Result<(), ConfigError> {
        settings.validate()?;
        let processing = &settings.processing;
        self.computer = TransmissionComputer::new(processing.transmission_window, processing.spectral_sigma);
        self.baselines.set_sigma(processing.spectral_sigma);
        if let Some(live) = self.latest.as_mut().filter(|l| l.sigma() != processing.spectral_sigma) {
            *live = SmoothedSpectrum::new(live.grid().clone(), processing.spectral_sigma);
        }
        self.tick_task.set_period(
            Duration::from_millis(u64::from(settings.acquisition.sample_period_ms)),
            now,
        );
        if settings.folders != self.settings.folders {
            self.settings = settings;
            self.refresh_file_lists();
        } else {
            self.settings = settings;
        }
        self.recompute_curve();
        Ok(())
    }

    /// Load and apply a settings file; later saves go to the same path.
    pub fn load_settings(&mut self, path: &Path, now: Instant) -> Result<()> {
        let settings = Settings::load(path)?;
        self.apply_settings(settings, now)?;
        self.settings_path = path.to_path_buf();
        log::info!("Using settings {}", path.display());
        Ok(())
    }

    pub fn save_settings(&mut self) {
        let path = self.settings_path.clone();
        let result = self.settings.save(&path);
        self.report(result.map(|_| format!("Settings saved to {}", path.display())));
    }

    // ---- Acquisition ----

    pub fn is_acquiring(&self) -> bool {
        self.read_task.is_running()
    }

    /// Start the device (if needed) and the read timer.
    pub fn start_acquisition(&mut self, now: Instant) -> Result<(), DeviceError> {
        if !self.device_started {
            let t = self.settings.acquisition.integration_time_ms;
            self.device.start(t)?;
            self.read_task
                .set_period(Duration::from_millis(u64::from(t)), now);
            self.device_started = true;
        }
        self.read_task.start(now);
        Ok(())
    }

    /// Stop reading and release the device. The run is kept.
    pub fn pause_acquisition(&mut self) {
        self.read_task.stop();
        if self.device_started {
            self.device.stop();
            self.device_started = false;
        }
    }

    /// Take one reading from the device and refresh the transmission curve.
    pub fn read_sample(&mut self) -> Result<()> {
        let x = self.device.generate_x().context("reading wavelengths")?;
        let y = self.device.generate_y().context("reading intensities")?;
        let grid = SampleGrid::new(x, y).context("device returned an invalid spectrum")?;
        self.latest = Some(SmoothedSpectrum::new(grid, self.computer.sigma));
        self.recompute_curve();
        Ok(())
    }

    fn recompute_curve(&mut self) {
        self.curve = self
            .latest
            .clone()
            .and_then(|live| self.computer.compute_smoothed(live, &self.baselines));
    }

    // ---- Baselines ----

    pub fn folder(&self, kind: BaselineKind) -> &Path {
        match kind {
            BaselineKind::Dark => &self.settings.folders.dark,
            BaselineKind::Reference => &self.settings.folders.bright,
        }
    }

    pub fn files(&self, kind: BaselineKind) -> &[PathBuf] {
        match kind {
            BaselineKind::Dark => &self.dark_files,
            BaselineKind::Reference => &self.bright_files,
        }
    }

    pub fn refresh_file_lists(&mut self) {
        for kind in [BaselineKind::Dark, BaselineKind::Reference] {
            let files = match list_spectrum_files(self.folder(kind)) {
                Ok(files) => files,
                Err(e) => {
                    log::error!("Failed to list {kind} folder: {e:#}");
                    Vec::new()
                }
            };
            match kind {
                BaselineKind::Dark => self.dark_files = files,
                BaselineKind::Reference => self.bright_files = files,
            }
        }
    }

    /// Load a baseline file and recompute the transmission curve.
    pub fn load_baseline(&mut self, kind: BaselineKind, path: &Path) -> Result<()> {
        let grid = load_spectrum(path)
            .with_context(|| format!("loading {kind} spectrum {}", path.display()))?;
        self.baselines.load(kind, grid, Some(path));
        self.recompute_curve();
        Ok(())
    }

    /// Save the latest raw reading into the folder for `kind` under a
    /// timestamped name.
    pub fn capture_baseline(&mut self, kind: BaselineKind) -> Result<PathBuf> {
        let latest = self
            .latest
            .as_ref()
            .context("no spectrum acquired yet")?;
        let folder = self.folder(kind).to_path_buf();
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("creating {}", folder.display()))?;
        let path = folder.join(capture_file_name(kind, Local::now()));
        save_spectrum_csv(&path, latest.wavelengths(), latest.raw())?;
        log::info!("Captured {kind} spectrum to {}", path.display());
        self.refresh_file_lists();
        Ok(path)
    }

    // ---- Time series ----

    pub fn is_tracking(&self) -> bool {
        self.tick_task.is_running()
    }

    /// Resolve the tracking layout against the latest spectrum and start the
    /// tick timer.
    pub fn start_series(&mut self, now: Instant) -> Result<(), TrackerError> {
        let grid = self
            .latest
            .as_ref()
            .map(SmoothedSpectrum::grid)
            .ok_or_else(|| TrackerError::InvalidParameter("no spectrum acquired yet".into()))?;
        self.tracker.set_params(self.settings.tracking)?;
        self.tracker.start(grid, &self.baselines, self.computer.window)?;
        self.tick_task.set_period(
            Duration::from_millis(u64::from(self.settings.acquisition.sample_period_ms)),
            now,
        );
        self.tick_task.start(now);
        Ok(())
    }

    pub fn pause_series(&mut self) {
        self.tick_task.stop();
    }

    /// Empty the run and stop ticking.
    pub fn clear_series(&mut self) {
        self.tick_task.stop();
        self.tracker.clear();
        self.last_outcome = None;
        self.skipped_ticks = 0;
    }

    /// One feature-tracking tick on the most recent spectrum. Configuration
    /// errors stop the tick timer.
    pub fn tick(&mut self) -> Result<TickOutcome, TrackerError> {
        match run_tick(
            &self.computer,
            &mut self.tracker,
            self.latest.as_ref(),
            &self.baselines,
        ) {
            Ok(Tick { outcome, curve }) => {
                if curve.is_some() {
                    self.curve = curve;
                }
                if !outcome.is_recorded() {
                    self.skipped_ticks += 1;
                }
                self.last_outcome = Some(outcome);
                Ok(outcome)
            }
            Err(e) => {
                log::warn!("Time series stopped: {e}");
                self.tick_task.stop();
                Err(e)
            }
        }
    }

    /// Run whatever task is due. Returns the time until the next one.
    pub fn poll(&mut self, now: Instant) -> Option<Duration> {
        if self.read_task.poll(now) {
            if let Err(e) = self.read_sample() {
                log::error!("Read failed: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
        if self.tick_task.poll(now) {
            if let Err(e) = self.tick() {
                self.status_message = Some(format!("Error: {e}"));
            }
        }
        self.next_wakeup(now)
    }

    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        [
            self.read_task.time_until_due(now),
            self.tick_task.time_until_due(now),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ---- Export ----

    /// Key/value record of the run configuration.
    pub fn parameters(&self, output: Option<&Path>) -> Vec<(String, String)> {
        let s = &self.settings;
        let source = |kind| {
            self.baselines
                .source(kind)
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        let fixed_minimum = self
            .tracker
            .anchor_index()
            .zip(self.curve.as_ref())
            .and_then(|(i, c)| c.wavelengths.get(i))
            .map(|w| format!("{w:.3}"))
            .unwrap_or_default();
        let bands = s
            .tracking
            .band_ratio
            .map(|b| {
                format!(
                    "{}±{} / {}±{}",
                    b.first.position, b.first.half_width, b.second.position, b.second.half_width
                )
            })
            .unwrap_or_else(|| "off".into());
        vec![
            (
                "Integration time (ms)".into(),
                s.acquisition.integration_time_ms.to_string(),
            ),
            (
                "Sample period (ms)".into(),
                s.acquisition.sample_period_ms.to_string(),
            ),
            ("Dark spectrum".into(), source(BaselineKind::Dark)),
            ("Reference spectrum".into(), source(BaselineKind::Reference)),
            (
                "Centroid half-window (nm)".into(),
                s.tracking.centroid_half_window.to_string(),
            ),
            (
                "Fixed position (nm)".into(),
                s.tracking.fixed_position.to_string(),
            ),
            (
                "Area window (nm)".into(),
                format!("{}-{}", s.tracking.area_low, s.tracking.area_high),
            ),
            ("Fixed minimum (nm)".into(), fixed_minimum),
            ("Band ratio".into(), bands),
            (
                "Output path".into(),
                output.map(|p| p.display().to_string()).unwrap_or_default(),
            ),
        ]
    }

    /// Write all result sheets into `dir`.
    pub fn export_results(&self, dir: &Path, format: ExportFormat) -> Result<Vec<PathBuf>> {
        let run = self.tracker.snapshot();
        let dark = self.baselines.dark();
        let reference = self.baselines.reference();
        let input = ResultsInput {
            wavelengths: dark
                .or(reference)
                .map(SmoothedSpectrum::wavelengths)
                .unwrap_or_default(),
            dark: dark.map(SmoothedSpectrum::raw).unwrap_or_default(),
            dark_smoothed: dark.map(SmoothedSpectrum::smoothed).unwrap_or_default(),
            reference: reference.map(SmoothedSpectrum::raw).unwrap_or_default(),
            reference_smoothed: reference.map(SmoothedSpectrum::smoothed).unwrap_or_default(),
            transmission_wavelengths: self
                .curve
                .as_ref()
                .map(|c| c.wavelengths.as_slice())
                .unwrap_or_default(),
            transmission: self
                .curve
                .as_ref()
                .map(|c| c.ratio.as_slice())
                .unwrap_or_default(),
            centroids: run.centroids(),
            centroids_smoothed: run.centroids_smoothed(),
            intensities: run.intensities(),
            intensities_smoothed: run.intensities_smoothed(),
            minima: run.minima(),
            area_ratios: run.area_ratios(),
            band_intensity_ratios: run.band_intensity_ratios(),
            band_area_ratios: run.band_area_ratios(),
            sample_period_ms: self.settings.acquisition.sample_period_ms,
            parameters: self.parameters(Some(dir)),
        };
        write_workbook(dir, &results_workbook(&input), format)
    }

    /// Surface an operation result in the status line and the log.
    pub fn report(&mut self, result: Result<String>) {
        match result {
            Ok(msg) => {
                log::info!("{msg}");
                self.status_message = Some(msg);
            }
            Err(e) => {
                log::error!("{e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Scene, SimulatorConfig};
    use crate::data::export::XLSX_FILE_NAME;
    use crate::pipeline::tracker::{BandRatioParams, SkipReason};

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fiberx-state-{}-{name}", std::process::id()))
    }

    fn session(name: &str) -> AppState {
        let root = temp_root(name);
        let mut settings = Settings::default();
        settings.folders.dark = root.join("dark");
        settings.folders.bright = root.join("bright");
        settings.folders.results = root.join("results");
        let device = SimulatedSpectrometer::new(SimulatorConfig {
            noise_std: 5.0,
            ..SimulatorConfig::default()
        });
        AppState::new(settings, root.join("fiberx.json"), device)
    }

    /// Capture and load both baselines through files, then return to the sample.
    fn calibrate(state: &mut AppState, t0: Instant) {
        state.start_acquisition(t0).unwrap();
        for (scene, kind) in [
            (Scene::Dark, BaselineKind::Dark),
            (Scene::Lamp, BaselineKind::Reference),
        ] {
            state.device.set_scene(scene);
            state.read_sample().unwrap();
            let path = state.capture_baseline(kind).unwrap();
            state.load_baseline(kind, &path).unwrap();
        }
        state.device.set_scene(Scene::Sample);
        state.read_sample().unwrap();
    }

    #[test]
    fn test_tick_before_baselines_is_skipped() {
        let mut state = session("not-ready");
        let t0 = Instant::now();
        state.start_acquisition(t0).unwrap();
        state.read_sample().unwrap();
        assert!(state.curve.is_none());
        assert!(state.start_series(t0).is_err());
        std::fs::remove_dir_all(temp_root("not-ready")).ok();
    }

    #[test]
    fn test_full_session() {
        let mut state = session("full");
        let t0 = Instant::now();
        calibrate(&mut state, t0);
        assert_eq!(state.files(BaselineKind::Dark).len(), 1);
        assert_eq!(state.files(BaselineKind::Reference).len(), 1);
        assert!(state.curve.is_some());

        state.start_series(t0).unwrap();
        for _ in 0..3 {
            state.read_sample().unwrap();
            let outcome = state.tick().unwrap();
            let sample = *outcome.sample().unwrap();
            assert!((sample.centroid_x - 700.0).abs() < 10.0, "{}", sample.centroid_x);
            assert!((sample.area_ratio - 100.0).abs() < 50.0);
        }
        assert_eq!(state.tracker.run().len(), 3);

        // Pausing acquisition keeps the run; ticks continue on stale data.
        state.pause_acquisition();
        assert!(state.tick().unwrap().is_recorded());
        assert_eq!(state.tracker.run().len(), 4);

        let dir = temp_root("full").join("results").join("run");
        let files = state.export_results(&dir, ExportFormat::Csv).unwrap();
        assert_eq!(files.len(), 7);
        let params = std::fs::read_to_string(dir.join("parameters.csv")).unwrap();
        assert!(params.contains("Centroid half-window (nm),25"));
        assert!(params.contains("Band ratio,off"));
        let centroid = std::fs::read_to_string(dir.join("centroid.csv")).unwrap();
        let rows: Vec<&str> = centroid.lines().collect();
        assert_eq!(rows.len(), 5);
        assert!(rows[0].starts_with("time,Centroid,"));
        assert!(rows[2].starts_with("1,"), "{}", rows[2]);
        assert!(params.contains("dark-"));

        state.clear_series();
        assert!(state.tracker.run().is_empty());
        assert!(!state.is_tracking());
        std::fs::remove_dir_all(temp_root("full")).ok();
    }

    #[test]
    fn test_losing_baseline_skips_without_touching_run() {
        let mut state = session("skip");
        let t0 = Instant::now();
        calibrate(&mut state, t0);
        state.start_series(t0).unwrap();
        state.tick().unwrap();
        state.baselines.clear(BaselineKind::Dark);
        assert_eq!(
            state.tick().unwrap(),
            TickOutcome::Skipped(SkipReason::NotReady)
        );
        assert_eq!(state.skipped_ticks, 1);
        assert_eq!(state.tracker.run().len(), 1);
        std::fs::remove_dir_all(temp_root("skip")).ok();
    }

    #[test]
    fn test_out_of_grid_position_is_reported() {
        let mut state = session("config");
        let t0 = Instant::now();
        calibrate(&mut state, t0);
        state.settings.tracking.fixed_position = 2000.0;
        let err = state.start_series(t0).unwrap_err();
        assert!(matches!(err, TrackerError::OutOfRange { .. }));
        assert!(!state.is_tracking());

        // On the grid, but past the 3000-sample transmission window (~845 nm).
        state.settings.tracking.fixed_position = 900.0;
        let err = state.start_series(t0).unwrap_err();
        assert!(
            matches!(err, TrackerError::FixedPositionBeyondCurve { len: 3000, .. }),
            "{err:?}"
        );
        assert!(!state.is_tracking());
        std::fs::remove_dir_all(temp_root("config")).ok();
    }

    #[test]
    fn test_band_ratios_through_session() {
        let mut state = session("bands");
        let t0 = Instant::now();
        calibrate(&mut state, t0);
        state.settings.tracking.band_ratio = Some(BandRatioParams::default());
        state.start_series(t0).unwrap();
        for _ in 0..2 {
            state.read_sample().unwrap();
            let sample = *state.tick().unwrap().sample().unwrap();
            let bands = sample.bands.unwrap();
            // Lamp peaks at 650 nm, so the 550 nm band reads lower.
            assert!(bands.intensity_ratio > 0.0 && bands.intensity_ratio < 100.0);
            assert!(bands.area_ratio > 0.0 && bands.area_ratio < 100.0);
        }

        let dir = temp_root("bands").join("results").join("run");
        let files = state.export_results(&dir, ExportFormat::Csv).unwrap();
        assert_eq!(files.len(), 8);
        let sheet = std::fs::read_to_string(dir.join("band_ratio.csv")).unwrap();
        assert!(sheet.starts_with("time,Intensity Ratio,Area Ratio"));

        let files = state.export_results(&dir, ExportFormat::Xlsx).unwrap();
        assert_eq!(files, vec![dir.join(XLSX_FILE_NAME)]);
        assert!(files[0].is_file());
        std::fs::remove_dir_all(temp_root("bands")).ok();
    }

    #[test]
    fn test_settings_round_trip_through_session() {
        let mut state = session("settings");
        let t0 = Instant::now();
        std::fs::create_dir_all(temp_root("settings")).unwrap();
        state.settings.acquisition.sample_period_ms = 500;
        state.save_settings();

        let mut other = session("settings");
        other.load_settings(&state.settings_path, t0).unwrap();
        assert_eq!(other.settings.acquisition.sample_period_ms, 500);
        assert_eq!(other.tick_task.period(), Duration::from_millis(500));

        let mut bad = other.settings.clone();
        bad.processing.transmission_window = 0;
        assert_eq!(other.apply_settings(bad, t0), Err(ConfigError::Window));
        assert_eq!(other.computer.window, 3000);
        std::fs::remove_dir_all(temp_root("settings")).ok();
    }

    #[test]
    fn test_poll_drives_both_tasks() {
        let mut state = session("poll");
        let t0 = Instant::now();
        calibrate(&mut state, t0);
        state.start_series(t0).unwrap();
        let wait = state.poll(t0).unwrap();
        assert_eq!(state.tracker.run().len(), 1);
        assert!(wait <= Duration::from_millis(200));

        // Only the read timer is due at +200 ms.
        state.poll(t0 + Duration::from_millis(200));
        assert_eq!(state.tracker.run().len(), 1);
        state.poll(t0 + Duration::from_millis(1000));
        assert_eq!(state.tracker.run().len(), 2);

        state.pause_series();
        state.poll(t0 + Duration::from_millis(5000));
        assert_eq!(state.tracker.run().len(), 2);
        std::fs::remove_dir_all(temp_root("poll")).ok();
    }
}
