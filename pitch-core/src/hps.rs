//! # Harmonic Product Spectrum
//!
//! Multiplies a magnitude spectrum by decimated copies of itself so that the
//! fundamental, which lines up with every decimated copy, stands out from its own
//! harmonics. The result is returned in decibels for peak searching.

/// Added to every bin before taking the logarithm so silent bins stay finite.
pub const LOG_EPSILON: f32 = 1e-10;

/// Computes the log-magnitude harmonic product spectrum up to `harmonics`.
///
/// For each order `h` in `2..=harmonics`, bins `0, h, 2h, ...` of the original spectrum
/// are multiplied into the first `ceil(len / h)` bins of the running product. Bins past
/// that prefix keep their lower-order product. The output has the same length as the
/// input and holds `20 * log10(product + 1e-10)`.
///
/// # Arguments
/// * `magnitudes` - One-sided magnitude spectrum
/// * `harmonics` - Highest harmonic order folded in; 1 gives the plain dB spectrum
///
/// # Returns
/// * `Vec<f32>` - Log-magnitude enhanced spectrum, same length as `magnitudes`
pub fn harmonic_product_spectrum(magnitudes: &[f32], harmonics: usize) -> Vec<f32> {
    let mut product = magnitudes.to_vec();

    for h in 2..=harmonics {
        for (acc, &decimated) in product.iter_mut().zip(magnitudes.iter().step_by(h)) {
            *acc *= decimated;
        }
    }

    product
        .into_iter()
        .map(|value| 20.0 * (value + LOG_EPSILON).log10())
        .collect()
}
