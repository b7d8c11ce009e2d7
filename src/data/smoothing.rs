// ---------------------------------------------------------------------------
// Gaussian smoothing
// ---------------------------------------------------------------------------

/// Kernel half-width in units of sigma.
pub const TRUNCATE: f64 = 4.0;

/// Longest kernel radius the filter uses, per input sample. Past a few
/// reflection periods the weights are flat and the output is the mean.
pub const MAX_RADIUS_PER_SAMPLE: usize = 16;

/// `TRUNCATE * sigma` rounded, capped at `max_radius`.
pub fn kernel_radius(sigma: f64, max_radius: usize) -> usize {
    let radius = TRUNCATE * sigma + 0.5;
    if radius < max_radius as f64 {
        radius as usize
    } else {
        max_radius
    }
}

/// Normalised Gaussian weights for offsets `-radius..=radius`, with the
/// radius capped at `max_radius`.
pub fn gaussian_kernel(sigma: f64, max_radius: usize) -> Vec<f64> {
    let radius = kernel_radius(sigma, max_radius);
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f64> = (0..=radius.saturating_mul(2))
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-(x * x) / denom).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Map a possibly out-of-bounds position onto `0..len` by mirroring about
/// the array edges (`d c b a | a b c d | d c b a`).
fn reflect(pos: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let m = pos.rem_euclid(period) as usize;
    if m >= len {
        2 * len - 1 - m
    } else {
        m
    }
}

/// One-dimensional Gaussian filter with mirrored boundaries and the kernel
/// truncated at [`TRUNCATE`] sigma.
///
/// `sigma <= 0` (or NaN) returns the input unchanged. NaN samples spread over
/// the kernel footprint.
pub fn gaussian_filter1d(input: &[f64], sigma: f64) -> Vec<f64> {
    if input.is_empty() || !(sigma > 0.0) {
        return input.to_vec();
    }
    let n = input.len();
    let kernel = gaussian_kernel(sigma, n.saturating_mul(MAX_RADIUS_PER_SAMPLE));
    let radius = (kernel.len() / 2) as isize;

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let pos = i as isize + k as isize - radius;
                    w * input[reflect(pos, n)]
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_normalised_and_symmetric() {
        let k = gaussian_kernel(10.0, usize::MAX);
        assert_eq!(k.len(), 81);
        let sum: f64 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for i in 0..k.len() / 2 {
            assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-15);
        }
    }

    #[test]
    fn test_constant_signal_unchanged() {
        let y = vec![42.0; 300];
        for v in gaussian_filter1d(&y, 100.0) {
            assert!((v - 42.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_short_signal_with_wide_kernel() {
        // Radius far exceeds the input length; reflection must still stay in bounds.
        let y = [1.0, 2.0, 3.0];
        let s = gaussian_filter1d(&y, 10.0);
        assert_eq!(s.len(), 3);
        for v in &s {
            assert!((v - 2.0).abs() < 0.1, "{v}");
        }
        let s = gaussian_filter1d(&y, 1.0);
        assert!(s[0] < s[1] && s[1] < s[2]);
    }

    #[test]
    fn test_huge_sigma_is_bounded() {
        assert_eq!(kernel_radius(1e300, 32), 32);
        assert_eq!(kernel_radius(f64::INFINITY, 32), 32);
        assert_eq!(kernel_radius(10.0, 64), 40);
        assert_eq!(gaussian_kernel(1e9, 32).len(), 65);

        let s = gaussian_filter1d(&[700.0, 701.0], 1e300);
        assert_eq!(s.len(), 2);
        for v in &s {
            assert!((v - 700.5).abs() < 0.05, "{v}");
        }
        let flat = gaussian_filter1d(&[4.0; 10], f64::INFINITY);
        assert!(flat.iter().all(|v| (v - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_reflect_indices() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(9, 4), 1);
        assert_eq!(reflect(-9, 1), 0);
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let y = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(gaussian_filter1d(&y, 0.0), y.to_vec());
    }

    #[test]
    fn test_smoothing_reduces_spike() {
        let mut y = vec![0.0; 101];
        y[50] = 1.0;
        let s = gaussian_filter1d(&y, 3.0);
        assert!(s[50] < 0.2);
        assert!((s.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
