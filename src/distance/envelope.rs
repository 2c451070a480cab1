//! LB_Keogh envelope precomputation (component C2).
//!
//! `upper[i] = max(S[i-w..=i+w])`, `lower[i] = min(S[i-w..=i+w])`, clipped to
//! valid indices, computed in O(L) per series with a monotonic deque.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// The upper/lower envelope of a series at a fixed warping band.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

impl Envelope {
    pub fn compute(series: &[f64], band: usize) -> Self {
        Self {
            upper: sliding_extreme(series, band, |a, b| a > b),
            lower: sliding_extreme(series, band, |a, b| a < b),
        }
    }
}

/// Memoizes envelopes for one series, keyed by `(window start, window
/// length, band)` (spec §4.2: "memoized on the series object keyed by
/// band", generalized here to the windows actually scanned -- member and
/// centroid subsequences, not just the full row). Writes are serialized per
/// series rather than per key, which is the cheaper of the two options
/// spec §5 allows for concurrent envelope construction.
#[derive(Debug, Default)]
pub struct EnvelopeCache {
    slots: Mutex<Vec<((usize, usize, usize), Arc<Envelope>)>>,
}

impl EnvelopeCache {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn get_or_compute(&self, start: usize, length: usize, band: usize, series: &[f64]) -> Arc<Envelope> {
        let key = (start, length, band);
        let mut slots = self.slots.lock().unwrap();
        if let Some((_, env)) = slots.iter().find(|(k, _)| *k == key) {
            return env.clone();
        }
        let env = Arc::new(Envelope::compute(series, band));
        slots.push((key, env.clone()));
        env
    }
}

/// Sliding-window extreme (max when `better(a, b)` means "a should replace
/// b", i.e. `a > b` for a max-envelope) over a window of radius `band`,
/// clipped at the series boundary. `deque` holds indices in increasing
/// order of position and decreasing order of "goodness", so the front is
/// always the extreme value visible to every window that still contains it.
fn sliding_extreme(series: &[f64], band: usize, better: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let n = series.len();
    let mut out = vec![0.0; n];
    let mut deque: VecDeque<usize> = VecDeque::with_capacity(n.min(2 * band + 2));
    let mut next_center = 0usize;

    let mut emit = |deque: &mut VecDeque<usize>, out: &mut Vec<f64>, i: usize| {
        let lo = i.saturating_sub(band);
        while let Some(&front) = deque.front() {
            if front < lo {
                deque.pop_front();
            } else {
                break;
            }
        }
        out[i] = series[*deque.front().expect("deque is non-empty once a point is pushed")];
    };

    for j in 0..n {
        while let Some(&back) = deque.back() {
            if better(series[j], series[back]) {
                deque.pop_back();
            } else {
                break;
            }
        }
        deque.push_back(j);

        if j >= band {
            let i = j - band;
            emit(&mut deque, &mut out, i);
            next_center = i + 1;
        }
    }
    for i in next_center..n {
        emit(&mut deque, &mut out, i);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_zero_is_identity() {
        let s = vec![3.0, 1.0, 4.0, 1.0, 5.0];
        let env = Envelope::compute(&s, 0);
        assert_eq!(env.upper, s);
        assert_eq!(env.lower, s);
    }

    #[test]
    fn matches_brute_force() {
        let s = vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        for band in 0..s.len() {
            let env = Envelope::compute(&s, band);
            for i in 0..s.len() {
                let lo = i.saturating_sub(band);
                let hi = (i + band).min(s.len() - 1);
                let want_max = s[lo..=hi].iter().cloned().fold(f64::MIN, f64::max);
                let want_min = s[lo..=hi].iter().cloned().fold(f64::MAX, f64::min);
                assert_eq!(env.upper[i], want_max, "band={band} i={i}");
                assert_eq!(env.lower[i], want_min, "band={band} i={i}");
            }
        }
    }
}
