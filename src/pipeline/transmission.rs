use crate::data::model::{SampleGrid, SmoothedSpectrum};

use super::baseline::{BaselineStore, DEFAULT_SPECTRAL_SIGMA};

/// Number of leading samples kept in the transmission curve. The device
/// buffer extends past the calibrated wavelength range.
pub const DEFAULT_WINDOW: usize = 3000;

/// Normalised transmission of one live sample against the baselines.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionCurve {
    /// Leading wavelengths of the live grid.
    pub wavelengths: Vec<f64>,
    /// `|(live - dark) / (reference - dark)| * 100`; non-finite entries are NaN.
    pub ratio: Vec<f64>,
    /// The smoothed live spectrum the curve was computed from (full length).
    pub live: SmoothedSpectrum,
}

impl TransmissionCurve {
    pub fn len(&self) -> usize {
        self.ratio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratio.is_empty()
    }

    /// Number of NaN entries.
    pub fn nan_count(&self) -> usize {
        self.ratio.iter().filter(|v| v.is_nan()).count()
    }
}

/// Elementwise transmission in percent. Division by zero and any other
/// non-finite result is reported as NaN.
pub fn transmission_ratio(live: f64, dark: f64, reference: f64) -> f64 {
    let v = ((live - dark) / (reference - dark)).abs() * 100.0;
    if v.is_finite() { v } else { f64::NAN }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmissionComputer {
    /// Leading samples kept.
    pub window: usize,
    /// Gaussian sigma applied to the live intensities.
    pub sigma: f64,
}

impl Default for TransmissionComputer {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            sigma: DEFAULT_SPECTRAL_SIGMA,
        }
    }
}

impl TransmissionComputer {
    pub fn new(window: usize, sigma: f64) -> Self {
        Self { window, sigma }
    }

    /// Smooth `live` and normalise it against the baselines.
    ///
    /// Returns `None` when the baselines are not ready for this sample; the
    /// caller skips the tick.
    pub fn compute(&self, live: &SampleGrid, baselines: &BaselineStore) -> Option<TransmissionCurve> {
        if !baselines.is_compatible_with(live) {
            log::debug!("Baselines not ready for a {}-sample spectrum", live.len());
            return None;
        }
        self.compute_smoothed(SmoothedSpectrum::new(live.clone(), self.sigma), baselines)
    }

    /// Same as [`compute`](Self::compute) for an already smoothed live spectrum.
    pub fn compute_smoothed(
        &self,
        live: SmoothedSpectrum,
        baselines: &BaselineStore,
    ) -> Option<TransmissionCurve> {
        let (dark, reference) = (baselines.dark()?, baselines.reference()?);
        if !baselines.is_compatible_with(live.grid()) {
            return None;
        }

        let n = self
            .window
            .min(live.len())
            .min(dark.len())
            .min(reference.len());

        let ratio: Vec<f64> = live.smoothed()[..n]
            .iter()
            .zip(&dark.smoothed()[..n])
            .zip(&reference.smoothed()[..n])
            .map(|((&l, &d), &r)| transmission_ratio(l, d, r))
            .collect();

        let curve = TransmissionCurve {
            wavelengths: live.wavelengths()[..n].to_vec(),
            ratio,
            live,
        };
        let nans = curve.nan_count();
        if nans > 0 {
            log::debug!("Transmission curve has {nans} non-finite samples");
        }
        Some(curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(values: Vec<f64>) -> SampleGrid {
        let x = (0..values.len()).map(|i| 400.0 + i as f64).collect();
        SampleGrid::new(x, values).unwrap()
    }

    fn store(dark: f64, reference: f64, len: usize) -> BaselineStore {
        let mut s = BaselineStore::new(0.0);
        s.load_dark(grid(vec![dark; len]));
        s.load_reference(grid(vec![reference; len]));
        s
    }

    #[test]
    fn test_not_ready_yields_none() {
        let computer = TransmissionComputer::new(10, 0.0);
        let live = grid(vec![1.0; 20]);
        assert!(computer.compute(&live, &BaselineStore::default()).is_none());
        // Length mismatch with the live sample.
        assert!(computer.compute(&live, &store(0.0, 100.0, 19)).is_none());
    }

    #[test]
    fn test_ratio_and_window() {
        let computer = TransmissionComputer::new(5, 0.0);
        let live = grid(vec![60.0; 8]);
        let curve = computer.compute(&live, &store(10.0, 110.0, 8)).unwrap();
        assert_eq!(curve.len(), 5);
        assert_eq!(curve.wavelengths, vec![400.0, 401.0, 402.0, 403.0, 404.0]);
        for v in &curve.ratio {
            assert!((v - 50.0).abs() < 1e-12);
        }
        assert_eq!(curve.live.len(), 8);
    }

    #[test]
    fn test_window_longer_than_spectrum() {
        let computer = TransmissionComputer::default();
        let live = grid(vec![20.0; 50]);
        let curve = computer.compute(&live, &store(0.0, 40.0, 50)).unwrap();
        assert_eq!(curve.len(), 50);
    }

    #[test]
    fn test_absolute_value() {
        assert!((transmission_ratio(0.0, 10.0, 110.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominator_is_nan() {
        assert!(transmission_ratio(5.0, 1.0, 1.0).is_nan());
        assert!(transmission_ratio(1.0, 1.0, 1.0).is_nan());
        let computer = TransmissionComputer::new(4, 0.0);
        let curve = computer.compute(&grid(vec![3.0; 4]), &store(2.0, 2.0, 4)).unwrap();
        assert_eq!(curve.nan_count(), 4);
    }
}
