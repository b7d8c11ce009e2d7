use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::data::model::{SampleGrid, interval_index};
use crate::data::smoothing::gaussian_filter1d;

use super::baseline::{BaselineKind, BaselineStore};
use super::error::TrackerError;
use super::geometry::polygon_centroid;
use super::transmission::TransmissionCurve;

/// Default Gaussian sigma (in ticks) for the smoothed time series.
pub const DEFAULT_SERIES_SIGMA: f64 = 10.0;
/// Largest accepted series sigma.
pub const MAX_SERIES_SIGMA: f64 = 500.0;

/// Transmission level of the synthetic edge that closes the centroid polygon.
pub const FULL_TRANSMISSION: f64 = 100.0;

// ---------------------------------------------------------------------------
// Parameters and layout
// ---------------------------------------------------------------------------

/// Operator-tunable feature parameters, all wavelengths in nm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Half-width of the centroid window around the minimum.
    pub centroid_half_window: f64,
    /// Wavelength of the fixed intensity readout.
    pub fixed_position: f64,
    /// Area-ratio band, `[area_low, area_high)`.
    pub area_low: f64,
    pub area_high: f64,
    /// Sigma for the smoothed centroid/intensity series.
    pub series_sigma: f64,
    /// Optional two-band comparison on the live spectrum.
    pub band_ratio: Option<BandRatioParams>,
}

/// A `position ± half_width` band, in nm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub position: f64,
    pub half_width: f64,
}

/// Two bands whose smoothed live intensities (at the centre and summed over
/// the band) are compared as `first / second * 100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRatioParams {
    pub first: Band,
    pub second: Band,
}

impl Default for BandRatioParams {
    fn default() -> Self {
        Self {
            first: Band {
                position: 550.0,
                half_width: 10.0,
            },
            second: Band {
                position: 650.0,
                half_width: 10.0,
            },
        }
    }
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            centroid_half_window: 25.0,
            fixed_position: 700.0,
            area_low: 500.0,
            area_high: 700.0,
            series_sigma: DEFAULT_SERIES_SIGMA,
            band_ratio: None,
        }
    }
}

impl TrackerParams {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !(self.centroid_half_window > 0.0 && self.centroid_half_window.is_finite()) {
            return Err(TrackerError::InvalidParameter(format!(
                "centroid half-window must be positive, got {}",
                self.centroid_half_window
            )));
        }
        if !(self.area_low < self.area_high) {
            return Err(TrackerError::EmptyAreaWindow {
                low: self.area_low,
                high: self.area_high,
            });
        }
        if !(0.0..=MAX_SERIES_SIGMA).contains(&self.series_sigma) {
            return Err(TrackerError::InvalidParameter(format!(
                "series sigma must be within 0..={MAX_SERIES_SIGMA}, got {}",
                self.series_sigma
            )));
        }
        if let Some(bands) = &self.band_ratio {
            for band in [bands.first, bands.second] {
                if !(band.half_width > 0.0 && band.half_width.is_finite()) {
                    return Err(TrackerError::InvalidParameter(format!(
                        "band half-width must be positive, got {}",
                        band.half_width
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A band resolved to grid indices: its centre and the half-open window
/// `[position - half_width, position + half_width)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BandWindow {
    pub index: usize,
    pub window: Range<usize>,
}

impl BandWindow {
    fn resolve(grid: &SampleGrid, band: &Band, name: &'static str) -> Result<Self, TrackerError> {
        let index = locate(grid, name, band.position)?;
        let low = locate(grid, name, band.position - band.half_width)?;
        let high = locate(grid, name, band.position + band.half_width)?;
        if low >= high {
            return Err(TrackerError::EmptyBand {
                position: band.position,
                half_width: band.half_width,
            });
        }
        Ok(Self {
            index,
            window: low..high,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    pub first: BandWindow,
    pub second: BandWindow,
}

impl BandLayout {
    /// Largest index the band ratios read, exclusive.
    fn end(&self) -> usize {
        [
            self.first.index + 1,
            self.first.window.end,
            self.second.index + 1,
            self.second.window.end,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Grid positions and the reference area, resolved once when a time series
/// starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerLayout {
    pub fixed_position_index: usize,
    pub area_window: Range<usize>,
    pub area_reference: f64,
    pub bands: Option<BandLayout>,
}

impl TrackerLayout {
    /// `window` is the transmission truncation; the fixed position must fall
    /// inside the truncated curve.
    pub fn resolve(
        params: &TrackerParams,
        grid: &SampleGrid,
        baselines: &BaselineStore,
        window: usize,
    ) -> Result<Self, TrackerError> {
        params.validate()?;
        let fixed_position_index = locate(grid, "fixed position", params.fixed_position)?;
        let curve_len = window.min(grid.len());
        if fixed_position_index >= curve_len {
            return Err(TrackerError::FixedPositionBeyondCurve {
                index: fixed_position_index,
                len: curve_len,
            });
        }
        let low = locate(grid, "area window start", params.area_low)?;
        let high = locate(grid, "area window end", params.area_high)?;
        if low >= high {
            return Err(TrackerError::EmptyAreaWindow {
                low: params.area_low,
                high: params.area_high,
            });
        }

        let reference = baselines
            .reference()
            .ok_or(TrackerError::BaselineMissing(BaselineKind::Reference))?;
        let area_reference =
            reference
                .weighted_area(low..high)
                .ok_or(TrackerError::ReferenceTooShort {
                    len: reference.len(),
                    end: high,
                })?;
        if area_reference == 0.0 || !area_reference.is_finite() {
            return Err(TrackerError::DegenerateReferenceArea(area_reference));
        }

        let bands = match &params.band_ratio {
            Some(b) => Some(BandLayout {
                first: BandWindow::resolve(grid, &b.first, "first band")?,
                second: BandWindow::resolve(grid, &b.second, "second band")?,
            }),
            None => None,
        };

        Ok(Self {
            fixed_position_index,
            area_window: low..high,
            area_reference,
            bands,
        })
    }
}

fn locate(grid: &SampleGrid, parameter: &'static str, value: f64) -> Result<usize, TrackerError> {
    grid.interval_index(value).ok_or_else(|| {
        let (min, max) = grid.range();
        TrackerError::OutOfRange {
            parameter,
            value,
            min,
            max,
        }
    })
}

// ---------------------------------------------------------------------------
// Tick results
// ---------------------------------------------------------------------------

/// Two-band comparison for one tick, both in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRatios {
    pub intensity_ratio: f64,
    pub area_ratio: f64,
}

/// Scalar features extracted from one transmission curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSample {
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub minimum_wavelength: f64,
    pub fixed_intensity: f64,
    pub area_ratio: f64,
    pub bands: Option<BandRatios>,
}

/// Why a tick produced no sample. None of these touch the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No live sample yet, or baselines missing/incompatible.
    NotReady,
    EmptyCurve,
    /// Every transmission value is NaN.
    NonFiniteCurve,
    /// The centroid window around the minimum leaves the grid.
    CentroidWindowOutOfRange,
    DegenerateCentroid,
    NonFiniteArea,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NotReady => "baselines or live sample not ready",
            SkipReason::EmptyCurve => "empty transmission curve",
            SkipReason::NonFiniteCurve => "transmission curve has no finite values",
            SkipReason::CentroidWindowOutOfRange => "centroid window leaves the wavelength grid",
            SkipReason::DegenerateCentroid => "centroid polygon is degenerate",
            SkipReason::NonFiniteArea => "area ratio is not finite",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Recorded(FeatureSample),
    Skipped(SkipReason),
}

impl TickOutcome {
    pub fn sample(&self) -> Option<&FeatureSample> {
        match self {
            TickOutcome::Recorded(s) => Some(s),
            TickOutcome::Skipped(_) => None,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, TickOutcome::Recorded(_))
    }
}

// ---------------------------------------------------------------------------
// Run – the accumulated time series
// ---------------------------------------------------------------------------

/// Parallel feature series, one entry per recorded tick. All series always
/// share the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Run {
    centroids: Vec<f64>,
    centroids_smoothed: Vec<f64>,
    intensities: Vec<f64>,
    intensities_smoothed: Vec<f64>,
    minima: Vec<f64>,
    area_ratios: Vec<f64>,
    /// NaN on ticks recorded without the two-band comparison.
    band_intensity_ratios: Vec<f64>,
    band_area_ratios: Vec<f64>,
}

impl Run {
    /// Append one sample and re-smooth the centroid and intensity series
    /// over the whole run.
    pub fn push(&mut self, sample: &FeatureSample, sigma: f64) {
        self.centroids.push(sample.centroid_x);
        self.intensities.push(sample.fixed_intensity);
        self.minima.push(sample.minimum_wavelength);
        self.area_ratios.push(sample.area_ratio);
        let bands = sample.bands.unwrap_or(BandRatios {
            intensity_ratio: f64::NAN,
            area_ratio: f64::NAN,
        });
        self.band_intensity_ratios.push(bands.intensity_ratio);
        self.band_area_ratios.push(bands.area_ratio);
        self.centroids_smoothed = gaussian_filter1d(&self.centroids, sigma);
        self.intensities_smoothed = gaussian_filter1d(&self.intensities, sigma);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn centroids(&self) -> &[f64] {
        &self.centroids
    }

    pub fn centroids_smoothed(&self) -> &[f64] {
        &self.centroids_smoothed
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn intensities_smoothed(&self) -> &[f64] {
        &self.intensities_smoothed
    }

    pub fn minima(&self) -> &[f64] {
        &self.minima
    }

    pub fn area_ratios(&self) -> &[f64] {
        &self.area_ratios
    }

    pub fn band_intensity_ratios(&self) -> &[f64] {
        &self.band_intensity_ratios
    }

    pub fn band_area_ratios(&self) -> &[f64] {
        &self.band_area_ratios
    }

    /// Whether any recorded tick carries band ratios.
    pub fn has_bands(&self) -> bool {
        self.band_intensity_ratios.iter().any(|v| !v.is_nan())
            || self.band_area_ratios.iter().any(|v| !v.is_nan())
    }
}

// ---------------------------------------------------------------------------
// Feature extraction helpers
// ---------------------------------------------------------------------------

/// Index of the smallest non-NaN value (first one on ties).
pub fn argmin_finite(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Centroid of the dip around `anchor`, bounded by `± half_window` nm and
/// closed against the [`FULL_TRANSMISSION`] line.
pub fn centroid_of_dip(
    wavelengths: &[f64],
    ratio: &[f64],
    anchor: usize,
    half_window: f64,
) -> Result<[f64; 2], SkipReason> {
    let x_min = *wavelengths.get(anchor).ok_or(SkipReason::EmptyCurve)?;
    let il = interval_index(&wavelengths[..anchor], x_min - half_window)
        .ok_or(SkipReason::CentroidWindowOutOfRange)?;
    let ir = interval_index(&wavelengths[anchor..], x_min + half_window)
        .ok_or(SkipReason::CentroidWindowOutOfRange)?
        + anchor;
    if ir <= il {
        return Err(SkipReason::DegenerateCentroid);
    }

    let mut boundary: Vec<[f64; 2]> = (il..ir).map(|i| [wavelengths[i], ratio[i]]).collect();
    boundary.push([wavelengths[ir], FULL_TRANSMISSION]);
    boundary.push([wavelengths[il], FULL_TRANSMISSION]);
    polygon_centroid(&boundary).ok_or(SkipReason::DegenerateCentroid)
}

/// `first / second * 100` at the band centres and over the band windows of
/// `smoothed`. Non-finite ratios become NaN. `None` if a band leaves the
/// spectrum.
pub fn band_ratios(smoothed: &[f64], layout: &BandLayout) -> Option<BandRatios> {
    let percent = |a: f64, b: f64| {
        let r = a / b * 100.0;
        if r.is_finite() { r } else { f64::NAN }
    };
    let (first, second) = (&layout.first, &layout.second);
    let area = |w: &BandWindow| smoothed.get(w.window.clone()).map(|s| s.iter().sum::<f64>());
    Some(BandRatios {
        intensity_ratio: percent(*smoothed.get(first.index)?, *smoothed.get(second.index)?),
        area_ratio: percent(area(first)?, area(second)?),
    })
}

// ---------------------------------------------------------------------------
// FeatureTracker
// ---------------------------------------------------------------------------

/// Turns successive transmission curves into the run's feature series.
#[derive(Debug, Clone, Default)]
pub struct FeatureTracker {
    params: TrackerParams,
    fix_minimum: bool,
    /// Minimum index used to anchor the centroid window.
    anchor: Option<usize>,
    layout: Option<TrackerLayout>,
    run: Run,
    last: Option<FeatureSample>,
}

impl FeatureTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    /// Replace the parameters. The layout is dropped; call
    /// [`start`](Self::start) again before the next tick.
    pub fn set_params(&mut self, params: TrackerParams) -> Result<(), TrackerError> {
        params.validate()?;
        self.params = params;
        self.layout = None;
        Ok(())
    }

    /// Resolve wavelengths to grid indices and compute the reference area.
    /// `window` is the transmission truncation in samples.
    pub fn start(
        &mut self,
        grid: &SampleGrid,
        baselines: &BaselineStore,
        window: usize,
    ) -> Result<&TrackerLayout, TrackerError> {
        let layout = TrackerLayout::resolve(&self.params, grid, baselines, window)?;
        log::info!(
            "Time series layout: fixed index {}, area window {:?}, reference area {:.3}",
            layout.fixed_position_index,
            layout.area_window,
            layout.area_reference
        );
        Ok(&*self.layout.insert(layout))
    }

    pub fn is_started(&self) -> bool {
        self.layout.is_some()
    }

    pub fn layout(&self) -> Option<&TrackerLayout> {
        self.layout.as_ref()
    }

    pub fn fix_minimum(&self) -> bool {
        self.fix_minimum
    }

    pub fn set_fix_minimum(&mut self, fixed: bool) {
        if fixed != self.fix_minimum {
            log::info!("Fix minimum: {fixed}");
        }
        self.fix_minimum = fixed;
    }

    pub fn toggle_fix_minimum(&mut self) -> bool {
        self.set_fix_minimum(!self.fix_minimum);
        self.fix_minimum
    }

    /// Index currently anchoring the centroid window.
    pub fn anchor_index(&self) -> Option<usize> {
        self.anchor
    }

    /// Extract features from `curve` and append them to the run.
    ///
    /// Transient numeric problems skip the tick and leave the run untouched;
    /// only configuration problems are returned as errors.
    pub fn advance(&mut self, curve: &TransmissionCurve) -> Result<TickOutcome, TrackerError> {
        let layout = self.layout.clone().ok_or(TrackerError::NotStarted)?;

        if curve.is_empty() || curve.wavelengths.len() != curve.ratio.len() {
            return Ok(self.skip(SkipReason::EmptyCurve));
        }
        if layout.fixed_position_index >= curve.len() {
            return Err(TrackerError::FixedPositionBeyondCurve {
                index: layout.fixed_position_index,
                len: curve.len(),
            });
        }
        if layout.area_window.end > curve.live.len() {
            return Err(TrackerError::AreaWindowBeyondSpectrum {
                end: layout.area_window.end,
                len: curve.live.len(),
            });
        }
        let bands = match &layout.bands {
            Some(b) => Some(band_ratios(curve.live.smoothed(), b).ok_or(
                TrackerError::AreaWindowBeyondSpectrum {
                    end: b.end(),
                    len: curve.live.len(),
                },
            )?),
            None => None,
        };

        let Some(min_idx) = argmin_finite(&curve.ratio) else {
            return Ok(self.skip(SkipReason::NonFiniteCurve));
        };
        let anchor = match self.anchor {
            Some(held) if self.fix_minimum && held < curve.len() => held,
            _ => min_idx,
        };
        self.anchor = Some(anchor);

        let [centroid_x, centroid_y] = match centroid_of_dip(
            &curve.wavelengths,
            &curve.ratio,
            anchor,
            self.params.centroid_half_window,
        ) {
            Ok(c) => c,
            Err(reason) => return Ok(self.skip(reason)),
        };

        let area_ratio = curve
            .live
            .weighted_area(layout.area_window.clone())
            .map_or(f64::NAN, |area| area / layout.area_reference * 100.0);
        if !area_ratio.is_finite() {
            return Ok(self.skip(SkipReason::NonFiniteArea));
        }

        let sample = FeatureSample {
            centroid_x,
            centroid_y,
            minimum_wavelength: curve.wavelengths[anchor],
            fixed_intensity: curve.ratio[layout.fixed_position_index],
            area_ratio,
            bands,
        };
        self.run.push(&sample, self.params.series_sigma);
        self.last = Some(sample);
        Ok(TickOutcome::Recorded(sample))
    }

    fn skip(&self, reason: SkipReason) -> TickOutcome {
        log::debug!("Tick {} skipped: {reason}", self.run.len());
        TickOutcome::Skipped(reason)
    }

    /// Empty the run. Layout and fix-minimum state are kept.
    pub fn clear(&mut self) {
        log::info!("Cleared time series ({} samples)", self.run.len());
        self.run.clear();
        self.last = None;
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    /// Owned copy of the run for readers that outlive the next tick.
    pub fn snapshot(&self) -> Run {
        self.run.clone()
    }

    pub fn last_sample(&self) -> Option<&FeatureSample> {
        self.last.as_ref()
    }
}
