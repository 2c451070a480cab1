//! Process-wide warping-band configuration.
//!
//! The Sakoe-Chiba band ratio is global, immutable-for-the-duration-of-a-
//! build-or-query state (spec §5, §9). Modeled as an atomically-stored `f64`
//! bit pattern rather than a `Mutex<f64>` since reads never need to observe
//! a torn value and writes are rare (set once before a build).

use std::sync::atomic::{AtomicU64, Ordering};

const DEFAULT_RATIO: f64 = 0.1;

static WARPING_BAND_RATIO: AtomicU64 = AtomicU64::new(DEFAULT_RATIO.to_bits());

/// Returns the current warping-band ratio (default `0.1`).
pub fn warping_band_ratio() -> f64 {
    let bits = WARPING_BAND_RATIO.load(Ordering::Relaxed);
    f64::from_bits(bits)
}

/// Sets the warping-band ratio used by subsequent builds and queries.
///
/// Changing this during an in-flight build or query yields undefined
/// results; it is a caller error to do so (spec §5).
pub fn set_warping_band_ratio(ratio: f64) {
    assert!(
        (0.0..=1.0).contains(&ratio),
        "warping band ratio must be in [0, 1]"
    );
    WARPING_BAND_RATIO.store(ratio.to_bits(), Ordering::Relaxed);
}

/// Sakoe-Chiba half-width for a series of the given length, under the
/// current global ratio.
pub fn calc_band(length: usize) -> usize {
    calc_band_with_ratio(length, warping_band_ratio())
}

/// Same as [`calc_band`] but takes an explicit ratio, letting callers
/// snapshot the ratio once at the start of a build/query (spec §9) instead
/// of re-reading the atomic on every call.
pub fn calc_band_with_ratio(length: usize, ratio: f64) -> usize {
    if length == 0 {
        return 0;
    }
    let band = (length as f64 * ratio).floor() as usize;
    band.min(length - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ratio_is_one_tenth() {
        assert!((warping_band_ratio() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn band_is_clamped_to_length_minus_one() {
        assert_eq!(calc_band_with_ratio(5, 1.0), 4);
        assert_eq!(calc_band_with_ratio(5, 0.0), 0);
        assert_eq!(calc_band_with_ratio(20, 0.1), 2);
    }

    #[test]
    fn zero_length_has_zero_band() {
        assert_eq!(calc_band_with_ratio(0, 0.5), 0);
    }
}
