use thiserror::Error;

use super::baseline::BaselineKind;

/// Configuration problems reported by the feature tracker. These indicate
/// operator misconfiguration and are distinct from skipped ticks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("{parameter} {value} nm is outside the wavelength grid ({min}..{max} nm)")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("area window {low}..{high} nm is empty")]
    EmptyAreaWindow { low: f64, high: f64 },
    #[error("{0} baseline is not loaded")]
    BaselineMissing(BaselineKind),
    #[error("band {position} ± {half_width} nm covers no samples")]
    EmptyBand { position: f64, half_width: f64 },
    #[error("reference spectrum has {len} samples, shorter than the area window end {end}")]
    ReferenceTooShort { len: usize, end: usize },
    #[error("reference area over the window is {0}; cannot normalise")]
    DegenerateReferenceArea(f64),
    #[error("fixed position index {index} is beyond the transmission curve ({len} samples)")]
    FixedPositionBeyondCurve { index: usize, len: usize },
    #[error("area window end {end} is beyond the live spectrum ({len} samples)")]
    AreaWindowBeyondSpectrum { end: usize, len: usize },
    #[error("time series has not been started")]
    NotStarted,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
