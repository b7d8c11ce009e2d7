//! Writes a dark, a bright and a few sample spectra from the simulated
//! spectrometer into the configured data folders.
//!
//! Usage: `generate_sample [SAMPLES]` (default 3).

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Local};

use fiberx::config::Settings;
use fiberx::data::loader::{capture_file_name, save_spectrum_csv};
use fiberx::device::{Scene, SimulatedSpectrometer, Spectrometer};
use fiberx::pipeline::baseline::BaselineKind;

fn read(device: &mut SimulatedSpectrometer, scene: Scene) -> Result<(Vec<f64>, Vec<f64>)> {
    device.set_scene(scene);
    let x = device.generate_x()?;
    let y = device.generate_y()?;
    Ok((x, y))
}

fn write(folder: &Path, name: &str, (x, y): &(Vec<f64>, Vec<f64>)) -> Result<()> {
    std::fs::create_dir_all(folder).with_context(|| format!("creating {}", folder.display()))?;
    let path = folder.join(name);
    save_spectrum_csv(&path, x, y)?;
    println!("Wrote {} ({} points)", path.display(), x.len());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let samples: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse().with_context(|| format!("invalid sample count '{arg}'"))?,
        None => 3,
    };

    let settings = Settings::load_or_default(&Settings::default_path());
    let folders = &settings.folders;
    let mut device = SimulatedSpectrometer::default();
    device.start(settings.acquisition.integration_time_ms)?;

    let now = Local::now();
    write(
        &folders.dark,
        &capture_file_name(BaselineKind::Dark, now),
        &read(&mut device, Scene::Dark)?,
    )?;
    write(
        &folders.bright,
        &capture_file_name(BaselineKind::Reference, now),
        &read(&mut device, Scene::Lamp)?,
    )?;

    // Sample reads one second apart, so the dip drifts between files.
    let sample_dir = folders.results.join("samples");
    for i in 0..samples {
        let at = now + Duration::seconds(i as i64);
        let name = format!("sample-{}.csv", at.format("%y%m%d-%H%M%S"));
        write(&sample_dir, &name, &read(&mut device, Scene::Sample)?)?;
    }

    device.stop();
    Ok(())
}
