//! Lower-bound cascade: Kim -> cross-Keogh -> banded DTW, short-circuiting
//! as soon as a stage's bound clears the dropout (component C3).
//!
//! Ported from `kimLowerBound`/`keoghLowerBound`/`crossKeoghLowerBound`/
//! `cascadeDistance` in the original engine's `distance/Distance.cpp`. The
//! original hardcodes a private `Euclidean` instance for the first two
//! stages regardless of which distance the index was built with -- only the
//! final DTW step varies by `distance_name`. This crate keeps that literally:
//! `kim_lower_bound`/`keogh_lower_bound` always measure points with the plain
//! squared-difference distance, never the caller-supplied kernel.

use super::envelope::Envelope;
use super::kernel::{Euclidean, Kernel};
use super::warped::warped_distance;

/// The point distance `kimLowerBound`/`keoghLowerBound` use in the original
/// engine, independent of `distance_name` (spec §4.3's `euclid_point`).
fn euclid_point(x: f64, y: f64) -> f64 {
    Euclidean.dist(x, y)
}

/// `LB_Kim`: a constant-work lower bound from the endpoints (spec §4.3.1).
pub fn kim_lower_bound(a: &[f64], b: &[f64]) -> f64 {
    let l = a.len().min(b.len());
    if l == 0 {
        return 0.0;
    }
    if l == 1 {
        euclid_point(a[0], b[0])
    } else {
        euclid_point(a[0], b[0]) + euclid_point(a[a.len() - 1], b[b.len() - 1])
    }
}

/// `LB_Keogh(a -> b)`: walks `b` against `a`'s envelope (spec §4.3.2).
/// `a_env` must have been computed at `band` over `a` itself.
pub fn keogh_lower_bound(a_env: &Envelope, b: &[f64], dropout: f64) -> f64 {
    let len = a_env.upper.len().min(b.len());
    let max_len = a_env.upper.len().max(b.len());
    let idropout = if dropout.is_finite() {
        let scaled = dropout * 2.0 * max_len as f64;
        scaled * scaled
    } else {
        f64::INFINITY
    };
    let mut lb = 0.0;
    for i in 0..len {
        if lb >= idropout {
            break;
        }
        if b[i] > a_env.upper[i] {
            lb += euclid_point(b[i], a_env.upper[i]);
        } else if b[i] < a_env.lower[i] {
            lb += euclid_point(b[i], a_env.lower[i]);
        }
    }
    lb
}

/// `LB_cross = max(LB_Keogh(a->b), LB_Keogh(b->a))`, short-circuiting once
/// the first leg alone clears `dropout` (spec §4.3.2). Both envelopes are
/// supplied by the caller (member/centroid envelopes come from the
/// [`crate::dataset::Dataset`] cache; the query envelope is computed once
/// per scan), so this never recomputes an envelope itself.
fn cross_keogh_lower_bound(a: &[f64], a_env: &Envelope, b: &[f64], b_env: &Envelope, dropout: f64) -> f64 {
    let lb_ab = keogh_lower_bound(a_env, b, dropout);
    if lb_ab > dropout {
        return f64::INFINITY;
    }
    let lb_ba = keogh_lower_bound(b_env, a, dropout);
    lb_ab.max(lb_ba)
}

/// The full Kim -> cross-Keogh -> banded-DTW cascade (spec §4.3). `a_env`
/// and `b_env` must already be the envelopes of `a` and `b` at `band`;
/// callers fetch these from whichever cache owns the series (spec §4.2) so
/// the cascade itself never does envelope work. Only the final DTW stage
/// uses `kernel`; the first two stages are always Euclidean, matching the
/// original engine.
pub fn cascade_distance<K: Kernel>(
    kernel: K,
    a: &[f64],
    a_env: &Envelope,
    b: &[f64],
    b_env: &Envelope,
    band: usize,
    dropout: f64,
) -> f64 {
    let lb_kim = kim_lower_bound(a, b);
    if lb_kim > dropout {
        return f64::INFINITY;
    }
    let lb_cross = cross_keogh_lower_bound(a, a_env, b, b_env, dropout);
    if lb_cross > dropout {
        return f64::INFINITY;
    }
    warped_distance(kernel, a, b, band, dropout)
}

/// Returns `(LB_Kim, LB_cross)` with no dropout pruning, for testing the
/// cascade's monotonicity (spec invariant 4 / property S4).
pub fn lower_bounds(a: &[f64], b: &[f64], band: usize) -> (f64, f64) {
    let a_env = Envelope::compute(a, band);
    let b_env = Envelope::compute(b, band);
    let kim = kim_lower_bound(a, b);
    let cross = cross_keogh_lower_bound(a, &a_env, b, &b_env, f64::INFINITY);
    (kim, cross)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::kernel::Euclidean;
    use crate::distance::warped::warped_distance;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn cascade_matches_full_dtw_with_infinite_dropout() {
        let a = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [1.0, 1.0, 2.0, 2.0, 4.0, 6.0];
        let band = 2;
        let a_env = Envelope::compute(&a, band);
        let b_env = Envelope::compute(&b, band);
        let cascaded = cascade_distance(Euclidean, &a, &a_env, &b, &b_env, band, f64::INFINITY);
        let direct = warped_distance(Euclidean, &a, &b, band, f64::INFINITY);
        assert!((cascaded - direct).abs() < 1e-9);
    }

    #[test]
    fn cascade_is_monotone_over_random_pairs() {
        let mut rng = StdRng::seed_from_u64(42);
        let band = 2;
        for _ in 0..1000 {
            let a: Vec<f64> = (0..20).map(|_| rng.gen_range(-5.0..5.0)).collect();
            let b: Vec<f64> = (0..20).map(|_| rng.gen_range(-5.0..5.0)).collect();
            let (kim, cross) = lower_bounds(&a, &b, band);
            let dtw = warped_distance(Euclidean, &a, &b, band, f64::INFINITY);
            assert!(kim <= cross + 1e-9, "kim={kim} cross={cross}");
            assert!(cross <= dtw + 1e-9, "cross={cross} dtw={dtw}");
        }
    }

    #[test]
    fn dropout_below_kim_short_circuits() {
        let a = [0.0, 0.0, 0.0];
        let b = [10.0, 10.0, 10.0];
        let band = 1;
        let a_env = Envelope::compute(&a, band);
        let b_env = Envelope::compute(&b, band);
        let d = cascade_distance(Euclidean, &a, &a_env, &b, &b_env, band, 0.01);
        assert!(d.is_infinite());
    }
}
