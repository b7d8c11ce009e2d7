//! Spectrometer interface and a simulated instrument.
//!
//! The vendor driver lives outside this crate; anything that can hand out a
//! wavelength axis and intensity reads implements [`Spectrometer`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("spectrometer has not been started")]
    NotStarted,
    #[error("invalid integration time {0} ms")]
    InvalidIntegrationTime(u32),
}

/// A wavelength-calibrated intensity source.
pub trait Spectrometer {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Apply the integration time and prepare for reads.
    fn start(&mut self, integration_time_ms: u32) -> Result<(), DeviceError>;

    /// The calibrated wavelength axis.
    fn generate_x(&mut self) -> Result<Vec<f64>, DeviceError>;

    /// One intensity read, same length as [`generate_x`](Self::generate_x).
    fn generate_y(&mut self) -> Result<Vec<f64>, DeviceError>;

    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// Simulated spectrometer
// ---------------------------------------------------------------------------

/// What the simulated detector is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    /// Lamp off: only the dark offset and read noise.
    Dark,
    /// Lamp on, empty fibre: the reference profile.
    Lamp,
    /// Lamp through a sample with an absorption dip.
    Sample,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub pixels: usize,
    pub first_wavelength: f64,
    pub last_wavelength: f64,
    pub dark_level: f64,
    /// Peak lamp counts at a 100 ms integration time.
    pub lamp_peak: f64,
    pub lamp_center: f64,
    pub lamp_width: f64,
    pub dip_center: f64,
    pub dip_width: f64,
    /// Fractional absorption at the dip centre (0..1).
    pub dip_depth: f64,
    /// Peak-to-peak drift of the dip centre, nm.
    pub dip_drift: f64,
    /// Reads per drift period.
    pub drift_period: f64,
    pub noise_std: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            pixels: 4096,
            first_wavelength: 340.0,
            last_wavelength: 1030.0,
            dark_level: 1500.0,
            lamp_peak: 30000.0,
            lamp_center: 650.0,
            lamp_width: 180.0,
            dip_center: 700.0,
            dip_width: 30.0,
            dip_depth: 0.5,
            dip_drift: 6.0,
            drift_period: 600.0,
            noise_std: 40.0,
            seed: 42,
        }
    }
}

/// Deterministic stand-in for the vendor device.
pub struct SimulatedSpectrometer {
    config: SimulatorConfig,
    scene: Scene,
    integration_time_ms: Option<u32>,
    reads: u64,
    rng: StdRng,
}

impl SimulatedSpectrometer {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            scene: Scene::Sample,
            integration_time_ms: None,
            reads: 0,
            rng,
        }
    }

    pub fn scene(&self) -> Scene {
        self.scene
    }

    pub fn set_scene(&mut self, scene: Scene) {
        log::info!("Simulator scene: {scene:?}");
        self.scene = scene;
    }

    fn wavelengths(&self) -> Vec<f64> {
        let c = &self.config;
        let n = c.pixels.max(2);
        let step = (c.last_wavelength - c.first_wavelength) / (n - 1) as f64;
        (0..n).map(|i| c.first_wavelength + i as f64 * step).collect()
    }

    /// Noise-free counts at wavelength `w` for the current scene.
    fn expected(&self, w: f64, gain: f64) -> f64 {
        let c = &self.config;
        let lamp = gain * c.lamp_peak * gaussian(w, c.lamp_center, c.lamp_width);
        match self.scene {
            Scene::Dark => c.dark_level,
            Scene::Lamp => c.dark_level + lamp,
            Scene::Sample => {
                let phase = std::f64::consts::TAU * self.reads as f64 / c.drift_period.max(1.0);
                let center = c.dip_center + 0.5 * c.dip_drift * phase.sin();
                let absorbed = c.dip_depth * gaussian(w, center, c.dip_width);
                c.dark_level + lamp * (1.0 - absorbed)
            }
        }
    }
}

impl Default for SimulatedSpectrometer {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

fn gaussian(x: f64, mu: f64, sigma: f64) -> f64 {
    (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

impl Spectrometer for SimulatedSpectrometer {
    fn name(&self) -> &str {
        "Simulated spectrometer"
    }

    fn start(&mut self, integration_time_ms: u32) -> Result<(), DeviceError> {
        if integration_time_ms == 0 {
            return Err(DeviceError::InvalidIntegrationTime(integration_time_ms));
        }
        log::info!("{} started, integration {integration_time_ms} ms", self.name());
        self.integration_time_ms = Some(integration_time_ms);
        Ok(())
    }

    fn generate_x(&mut self) -> Result<Vec<f64>, DeviceError> {
        self.integration_time_ms.ok_or(DeviceError::NotStarted)?;
        Ok(self.wavelengths())
    }

    fn generate_y(&mut self) -> Result<Vec<f64>, DeviceError> {
        let t = self.integration_time_ms.ok_or(DeviceError::NotStarted)?;
        // Counts scale with integration time, saturating like a 16-bit ADC.
        let gain = f64::from(t) / 100.0;
        let std = self.config.noise_std;
        let mut y: Vec<f64> = self
            .wavelengths()
            .into_iter()
            .map(|w| self.expected(w, gain))
            .collect();
        for v in &mut y {
            let z: f64 = self.rng.sample(StandardNormal);
            *v = (*v + std * z).clamp(0.0, 65535.0);
        }
        self.reads += 1;
        Ok(y)
    }

    fn stop(&mut self) {
        if self.integration_time_ms.take().is_some() {
            log::info!("{} stopped", self.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SimulatedSpectrometer {
        SimulatedSpectrometer::new(SimulatorConfig {
            noise_std: 0.0,
            ..SimulatorConfig::default()
        })
    }

    #[test]
    fn test_read_requires_start() {
        let mut dev = quiet();
        assert_eq!(dev.generate_y(), Err(DeviceError::NotStarted));
        assert_eq!(dev.start(0), Err(DeviceError::InvalidIntegrationTime(0)));
        dev.start(100).unwrap();
        assert_eq!(dev.generate_x().unwrap().len(), 4096);
        dev.stop();
        assert_eq!(dev.generate_x(), Err(DeviceError::NotStarted));
    }

    #[test]
    fn test_axis_increasing_and_matches_reads() {
        let mut dev = SimulatedSpectrometer::default();
        dev.start(100).unwrap();
        let x = dev.generate_x().unwrap();
        let y = dev.generate_y().unwrap();
        assert_eq!(x.len(), y.len());
        assert!(x.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_scenes_order() {
        let mut dev = quiet();
        dev.start(100).unwrap();
        let x = dev.generate_x().unwrap();
        let i700 = x.partition_point(|&w| w < 700.0);

        dev.set_scene(Scene::Dark);
        let dark = dev.generate_y().unwrap()[i700];
        dev.set_scene(Scene::Lamp);
        let lamp = dev.generate_y().unwrap()[i700];
        dev.set_scene(Scene::Sample);
        let sample = dev.generate_y().unwrap()[i700];

        assert!(dark < sample && sample < lamp);
        let transmission = (sample - dark) / (lamp - dark);
        assert!((transmission - 0.5).abs() < 0.05, "{transmission}");
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let mut a = SimulatedSpectrometer::default();
        let mut b = SimulatedSpectrometer::default();
        a.start(100).unwrap();
        b.start(100).unwrap();
        assert_eq!(a.generate_y().unwrap(), b.generate_y().unwrap());
    }
}
