//! Point-to-point fold across aligned indices, with early dropout.

use super::kernel::Kernel;

/// Folds `kernel` across the aligned prefix of `a` and `b`, returning
/// `+∞` immediately once the accumulator guarantees the final distance
/// will exceed `dropout` (spec §4.1).
pub fn pairwise_distance<K: Kernel>(kernel: K, a: &[f64], b: &[f64], dropout: f64) -> f64 {
    let len = a.len().min(b.len());
    let mut acc = kernel.init();
    for i in 0..len {
        acc = kernel.reduce(acc, a[i], b[i]);
        if kernel.exceeds(acc, dropout) {
            return f64::INFINITY;
        }
    }
    kernel.norm(acc, a.len(), b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::kernel::{Euclidean, Manhattan};

    #[test]
    fn no_dropout_matches_full_fold() {
        let a = [0.0, 3.0, 4.0];
        let b = [4.0, 0.0, 4.0];
        let d = pairwise_distance(Euclidean, &a, &b, f64::INFINITY);
        assert_eq!(d, 5.0);
    }

    #[test]
    fn dropout_short_circuits_to_infinity() {
        let a = [0.0, 100.0];
        let b = [0.0, 0.0];
        let d = pairwise_distance(Manhattan, &a, &b, 1.0);
        assert!(d.is_infinite());
    }

    #[test]
    fn dropout_allows_improving_matches_through() {
        let a = [0.0, 1.0];
        let b = [0.0, 1.5];
        let d = pairwise_distance(Manhattan, &a, &b, 1.0);
        assert!((d - 0.5).abs() < 1e-12);
    }
}
