use std::fmt;
use std::path::{Path, PathBuf};

use crate::data::model::{SampleGrid, SmoothedSpectrum};

/// Default Gaussian sigma (in samples) for spectral smoothing.
pub const DEFAULT_SPECTRAL_SIGMA: f64 = 100.0;
/// Largest accepted spectral sigma.
pub const MAX_SPECTRAL_SIGMA: f64 = 1000.0;

/// Which of the two normalisation baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaselineKind {
    /// Sensor reading with the light source off.
    Dark,
    /// Reading with full light and no sample (100 % transmission).
    Reference,
}

impl fmt::Display for BaselineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineKind::Dark => write!(f, "dark"),
            BaselineKind::Reference => write!(f, "reference"),
        }
    }
}

/// A loaded baseline and the file it came from, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub spectrum: SmoothedSpectrum,
    pub source: Option<PathBuf>,
}

/// The most recently loaded dark and reference spectra.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    dark: Option<Baseline>,
    reference: Option<Baseline>,
    sigma: f64,
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new(DEFAULT_SPECTRAL_SIGMA)
    }
}

impl BaselineStore {
    pub fn new(sigma: f64) -> Self {
        Self {
            dark: None,
            reference: None,
            sigma,
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Change the smoothing sigma, re-smoothing any loaded baselines.
    pub fn set_sigma(&mut self, sigma: f64) {
        if sigma == self.sigma {
            return;
        }
        self.sigma = sigma;
        for baseline in [&mut self.dark, &mut self.reference].into_iter().flatten() {
            baseline.spectrum = SmoothedSpectrum::new(baseline.spectrum.grid().clone(), sigma);
        }
    }

    /// Replace the baseline of `kind`, smoothing it once.
    pub fn load(&mut self, kind: BaselineKind, grid: SampleGrid, source: Option<&Path>) {
        log::info!(
            "Loaded {kind} baseline: {} samples{}",
            grid.len(),
            source
                .map(|p| format!(" from {}", p.display()))
                .unwrap_or_default()
        );
        let baseline = Baseline {
            spectrum: SmoothedSpectrum::new(grid, self.sigma),
            source: source.map(Path::to_path_buf),
        };
        *self.slot_mut(kind) = Some(baseline);
    }

    pub fn load_dark(&mut self, grid: SampleGrid) {
        self.load(BaselineKind::Dark, grid, None);
    }

    pub fn load_reference(&mut self, grid: SampleGrid) {
        self.load(BaselineKind::Reference, grid, None);
    }

    pub fn clear(&mut self, kind: BaselineKind) {
        *self.slot_mut(kind) = None;
    }

    pub fn get(&self, kind: BaselineKind) -> Option<&Baseline> {
        match kind {
            BaselineKind::Dark => self.dark.as_ref(),
            BaselineKind::Reference => self.reference.as_ref(),
        }
    }

    pub fn dark(&self) -> Option<&SmoothedSpectrum> {
        self.dark.as_ref().map(|b| &b.spectrum)
    }

    pub fn reference(&self) -> Option<&SmoothedSpectrum> {
        self.reference.as_ref().map(|b| &b.spectrum)
    }

    pub fn source(&self, kind: BaselineKind) -> Option<&Path> {
        self.get(kind).and_then(|b| b.source.as_deref())
    }

    /// Both baselines loaded with equal lengths.
    pub fn is_ready(&self) -> bool {
        match (self.dark(), self.reference()) {
            (Some(d), Some(r)) => d.len() == r.len(),
            _ => false,
        }
    }

    /// Ready, and the baselines match the length of `live`.
    pub fn is_compatible_with(&self, live: &SampleGrid) -> bool {
        self.is_ready() && self.dark().is_some_and(|d| d.len() == live.len())
    }

    fn slot_mut(&mut self, kind: BaselineKind) -> &mut Option<Baseline> {
        match kind {
            BaselineKind::Dark => &mut self.dark,
            BaselineKind::Reference => &mut self.reference,
        }
    }
}
