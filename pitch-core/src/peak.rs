//! # Peak Refinement
//!
//! Locates the dominant bin of a log-magnitude spectrum and refines it to sub-bin
//! accuracy with a three-point parabola fit.

/// Sub-bin location and height of a spectral peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinedPeak {
    /// Fractional bin index of the peak.
    pub bin: f32,
    /// Interpolated log-magnitude at `bin`.
    pub value: f32,
}

/// Quadratic interpolation around bin `x` of `f`.
///
/// Fits a parabola through `f[x-1], f[x], f[x+1]` and returns its vertex. Edge bins and
/// a flat local shape (zero curvature) are returned unrefined.
///
/// # Arguments
/// * `f` - Log-magnitude spectrum
/// * `x` - Index of the local maximum to refine
///
/// # Returns
/// * `RefinedPeak` - `x + 0.5 (a - c) / (a - 2b + c)` and `b - 0.25 (a - c)^2 / (a - 2b + c)`
///
/// # Panics
/// * If `x` is out of bounds for `f`.
pub fn parabolic(f: &[f32], x: usize) -> RefinedPeak {
    if x == 0 || x + 1 >= f.len() {
        return RefinedPeak { bin: x as f32, value: f[x] };
    }

    let (a, b, c) = (f[x - 1], f[x], f[x + 1]);
    let denom = a - 2.0 * b + c;
    if denom == 0.0 {
        return RefinedPeak { bin: x as f32, value: b };
    }

    RefinedPeak {
        bin: x as f32 + 0.5 * (a - c) / denom,
        value: b - 0.25 * (a - c) * (a - c) / denom,
    }
}

/// Index of the highest bin. Ties resolve to the lowest index.
pub fn peak_bin(spectrum: &[f32]) -> Option<usize> {
    spectrum
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, best_v)) if best_v >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Finds the highest bin of `spectrum` and refines it.
///
/// Returns `None` for an empty spectrum.
pub fn find_peak(spectrum: &[f32]) -> Option<RefinedPeak> {
    peak_bin(spectrum).map(|x| parabolic(spectrum, x))
}
