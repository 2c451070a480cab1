//! Distance registry + kernel lookup (component C1).
//!
//! Five named kernels are registered behind a closed `enum` rather than a
//! `dyn Kernel` trait object (spec §9's "polymorphic distance" note): the
//! DTW hot loop still only ever calls a monomorphic generic function, and
//! dispatch to the right one happens once per call at the outer match, not
//! per point.

pub mod cascade;
pub mod envelope;
pub mod kernel;
pub mod pairwise;
pub mod warped;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

pub use kernel::{Chebyshev, Cosine, Euclidean, Kernel, Manhattan, Sorensen};
pub use pairwise::pairwise_distance;
pub use warped::{warped_distance, warped_distance_with_path};

use envelope::Envelope;

use crate::error::{GenexError, GenexResult};

/// The five registered kernels, dispatched by enum match.
#[derive(Copy, Clone, Debug)]
pub enum DistanceKernel {
    Euclidean(Euclidean),
    Manhattan(Manhattan),
    Chebyshev(Chebyshev),
    Cosine(Cosine),
    Sorensen(Sorensen),
}

macro_rules! dispatch {
    ($self:expr, $k:ident => $body:expr) => {
        match $self {
            DistanceKernel::Euclidean($k) => $body,
            DistanceKernel::Manhattan($k) => $body,
            DistanceKernel::Chebyshev($k) => $body,
            DistanceKernel::Cosine($k) => $body,
            DistanceKernel::Sorensen($k) => $body,
        }
    };
}

impl DistanceKernel {
    pub fn name(&self) -> &'static str {
        match self {
            DistanceKernel::Euclidean(_) => "euclidean",
            DistanceKernel::Manhattan(_) => "manhattan",
            DistanceKernel::Chebyshev(_) => "chebyshev",
            DistanceKernel::Cosine(_) => "cosine",
            DistanceKernel::Sorensen(_) => "sorensen",
        }
    }

    /// Pointwise fold with dropout, no warping (spec §4.1's pairwise mode).
    pub fn pairwise(&self, a: &[f64], b: &[f64], dropout: f64) -> f64 {
        dispatch!(self, k => pairwise_distance(*k, a, b, dropout))
    }

    /// Banded DTW with dropout, no lower-bound cascade.
    pub fn warped(&self, a: &[f64], b: &[f64], band: usize, dropout: f64) -> f64 {
        dispatch!(self, k => warped_distance(*k, a, b, band, dropout))
    }

    /// Banded DTW with dropout, also returning the alignment path.
    pub fn warped_with_path(
        &self,
        a: &[f64],
        b: &[f64],
        band: usize,
        dropout: f64,
    ) -> (f64, Vec<(usize, usize)>) {
        dispatch!(self, k => warped_distance_with_path(*k, a, b, band, dropout))
    }

    /// Kim -> cross-Keogh -> banded-DTW cascade. `a_env`/`b_env` must
    /// already be `Envelope::compute(a, band)`/`Envelope::compute(b, band)`
    /// (or, for a dataset member/centroid, the cached equivalent from
    /// [`crate::dataset::Dataset::keogh_upper`]).
    pub fn cascade(&self, a: &[f64], a_env: &Envelope, b: &[f64], b_env: &Envelope, band: usize, dropout: f64) -> f64 {
        dispatch!(self, k => cascade::cascade_distance(*k, a, a_env, b, b_env, band, dropout))
    }
}

fn registry() -> &'static HashMap<&'static str, DistanceKernel> {
    static REGISTRY: OnceLock<HashMap<&'static str, DistanceKernel>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("euclidean", DistanceKernel::Euclidean(Euclidean));
        map.insert("manhattan", DistanceKernel::Manhattan(Manhattan));
        map.insert("chebyshev", DistanceKernel::Chebyshev(Chebyshev));
        map.insert("cosine", DistanceKernel::Cosine(Cosine));
        map.insert("sorensen", DistanceKernel::Sorensen(Sorensen));
        map
    })
}

/// Looks up a kernel by its registered name. Fails fast with
/// `UnknownDistance` at either build or query time (spec §4.1).
pub fn lookup(name: &str) -> GenexResult<DistanceKernel> {
    registry()
        .get(name)
        .copied()
        .ok_or_else(|| GenexError::UnknownDistance(name.to_string()))
}

/// All registered distance names, sorted for stable display.
pub fn all_distance_names() -> Vec<&'static str> {
    let mut names: Vec<_> = registry().keys().copied().collect();
    names.sort_unstable();
    names
}

/// Orders distances treating `NaN` as `+∞` (spec §7: "NaNs propagate and
/// are treated as +∞ for comparison").
pub fn cmp_dist(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_all_five_kernels() {
        for name in ["euclidean", "manhattan", "chebyshev", "cosine", "sorensen"] {
            assert_eq!(lookup(name).unwrap().name(), name);
        }
    }

    #[test]
    fn lookup_rejects_unknown_name() {
        assert!(matches!(lookup("bogus"), Err(GenexError::UnknownDistance(_))));
    }

    #[test]
    fn nan_sorts_as_worst() {
        assert_eq!(cmp_dist(1.0, f64::NAN), Ordering::Less);
        assert_eq!(cmp_dist(f64::NAN, 1.0), Ordering::Greater);
        assert_eq!(cmp_dist(f64::NAN, f64::NAN), Ordering::Equal);
    }
}
