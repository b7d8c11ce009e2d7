use thiserror::Error;

use super::smoothing::gaussian_filter1d;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a pair of arrays cannot form a [`SampleGrid`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("spectrum is empty")]
    Empty,
    #[error("wavelengths has {wavelengths} values but intensities has {intensities}")]
    LengthMismatch {
        wavelengths: usize,
        intensities: usize,
    },
    #[error("wavelengths are not strictly increasing at index {index} ({previous} -> {current})")]
    NotIncreasing {
        index: usize,
        previous: f64,
        current: f64,
    },
}

// ---------------------------------------------------------------------------
// Interval search over an ascending grid
// ---------------------------------------------------------------------------

/// Index of the largest grid point `w` with `w <= value < next(w)`.
///
/// Returns `None` when `value < grid[0]`, `value >= grid[last]` or `value`
/// is NaN. `grid` must be ascending.
pub fn interval_index(grid: &[f64], value: f64) -> Option<usize> {
    let (first, last) = (*grid.first()?, *grid.last()?);
    if !(value >= first && value < last) {
        return None;
    }
    // Number of points <= value; at least 1 because value >= first.
    let upper = grid.partition_point(|&w| w <= value);
    Some(upper - 1)
}

/// The grid value bracketing `value` from below, see [`interval_index`].
pub fn find_interval(grid: &[f64], value: f64) -> Option<f64> {
    interval_index(grid, value).map(|i| grid[i])
}

/// Position of an exact grid value (as returned by [`find_interval`]).
pub fn index_of(grid: &[f64], value: f64) -> Option<usize> {
    let i = grid.partition_point(|&w| w < value);
    (i < grid.len() && grid[i] == value).then_some(i)
}

// ---------------------------------------------------------------------------
// SampleGrid – one acquired spectrum
// ---------------------------------------------------------------------------

/// One acquired spectrum: a strictly increasing wavelength axis and the raw
/// intensities read at each wavelength. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    wavelengths: Vec<f64>,
    intensities: Vec<f64>,
}

impl SampleGrid {
    pub fn new(wavelengths: Vec<f64>, intensities: Vec<f64>) -> Result<Self, GridError> {
        if wavelengths.len() != intensities.len() {
            return Err(GridError::LengthMismatch {
                wavelengths: wavelengths.len(),
                intensities: intensities.len(),
            });
        }
        if wavelengths.is_empty() {
            return Err(GridError::Empty);
        }
        if let Some(i) = wavelengths.windows(2).position(|w| !(w[0] < w[1])) {
            return Err(GridError::NotIncreasing {
                index: i + 1,
                previous: wavelengths[i],
                current: wavelengths[i + 1],
            });
        }
        Ok(Self {
            wavelengths,
            intensities,
        })
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// First and last wavelength.
    pub fn range(&self) -> (f64, f64) {
        (
            self.wavelengths[0],
            self.wavelengths[self.wavelengths.len() - 1],
        )
    }

    pub fn find_interval(&self, value: f64) -> Option<f64> {
        find_interval(&self.wavelengths, value)
    }

    pub fn interval_index(&self, value: f64) -> Option<usize> {
        interval_index(&self.wavelengths, value)
    }
}

// ---------------------------------------------------------------------------
// SmoothedSpectrum – a grid together with its Gaussian-smoothed intensities
// ---------------------------------------------------------------------------

/// A [`SampleGrid`] and its smoothed intensity curve, computed once on
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedSpectrum {
    grid: SampleGrid,
    smoothed: Vec<f64>,
    sigma: f64,
}

impl SmoothedSpectrum {
    pub fn new(grid: SampleGrid, sigma: f64) -> Self {
        let smoothed = gaussian_filter1d(grid.intensities(), sigma);
        Self {
            grid,
            smoothed,
            sigma,
        }
    }

    pub fn grid(&self) -> &SampleGrid {
        &self.grid
    }

    pub fn wavelengths(&self) -> &[f64] {
        self.grid.wavelengths()
    }

    pub fn raw(&self) -> &[f64] {
        self.grid.intensities()
    }

    pub fn smoothed(&self) -> &[f64] {
        &self.smoothed
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// `Σ wavelength · smoothed` over `range`, the band "area" used by the
    /// area-ratio feature. `None` when the range does not fit the spectrum.
    pub fn weighted_area(&self, range: std::ops::Range<usize>) -> Option<f64> {
        let x = self.wavelengths().get(range.clone())?;
        let y = self.smoothed.get(range)?;
        Some(x.iter().zip(y).map(|(a, b)| a * b).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_interval_between_points() {
        let grid = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(find_interval(&grid, 3.5), Some(3.0));
        assert_eq!(interval_index(&grid, 3.5), Some(2));
    }

    #[test]
    fn test_find_interval_exact_points() {
        let grid = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(find_interval(&grid, 1.0), Some(1.0));
        assert_eq!(find_interval(&grid, 3.0), Some(3.0));
        assert_eq!(find_interval(&grid, 4.0), Some(4.0));
    }

    #[test]
    fn test_find_interval_out_of_range() {
        let grid = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(find_interval(&grid, 0.999), None);
        assert_eq!(find_interval(&grid, 5.0), None);
        assert_eq!(find_interval(&grid, 7.0), None);
        assert_eq!(find_interval(&grid, f64::NAN), None);
        assert_eq!(find_interval(&[], 1.0), None);
        assert_eq!(find_interval(&[1.0], 1.0), None);
    }

    #[test]
    fn test_find_interval_dense_grid() {
        let grid: Vec<f64> = (0..4096).map(|i| 340.0 + i as f64 * 0.17).collect();
        for &v in &[340.0, 500.3, 700.0, 1000.01] {
            let i = interval_index(&grid, v).unwrap();
            assert!(grid[i] <= v && v < grid[i + 1], "value {v} at index {i}");
        }
    }

    #[test]
    fn test_index_of_matches_find_interval() {
        let grid: Vec<f64> = (500..=900).map(f64::from).collect();
        let w = find_interval(&grid, 612.4).unwrap();
        assert_eq!(index_of(&grid, w), Some(112));
        assert_eq!(index_of(&grid, 612.4), None);
        assert_eq!(index_of(&grid, 2000.0), None);
    }

    #[test]
    fn test_sample_grid_validation() {
        assert_eq!(SampleGrid::new(vec![], vec![]), Err(GridError::Empty));
        assert!(matches!(
            SampleGrid::new(vec![1.0, 2.0], vec![1.0]),
            Err(GridError::LengthMismatch { .. })
        ));
        assert!(matches!(
            SampleGrid::new(vec![1.0, 2.0, 2.0], vec![0.0; 3]),
            Err(GridError::NotIncreasing { index: 2, .. })
        ));
        let grid = SampleGrid::new(vec![1.0, 2.0, 3.0], vec![5.0, 6.0, 7.0]).unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.range(), (1.0, 3.0));
    }

    #[test]
    fn test_weighted_area() {
        let grid = SampleGrid::new(vec![1.0, 2.0, 3.0], vec![2.0, 2.0, 2.0]).unwrap();
        let sp = SmoothedSpectrum::new(grid, 0.0);
        assert_eq!(sp.weighted_area(0..3), Some(12.0));
        assert_eq!(sp.weighted_area(1..2), Some(4.0));
        assert_eq!(sp.weighted_area(1..5), None);
    }
}
