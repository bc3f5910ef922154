//! Correlation kernel implementations.
//!
//! A kernel turns a template plan plus a slice of continuous samples into
//! the dense normalized cross-correlation series, one value per placement.
//! The scalar kernel is always available; the SIMD kernel (feature `simd`)
//! vectorizes the dot product with `wide::f32x8`. Both share the same
//! f64 sliding-window statistics, so their results agree within floating
//! tolerance and the backends are interchangeable by configuration.

use tracing::warn;

use crate::corr::plan::TemplatePlan;
use crate::util::{MatchError, MatchResult};

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

/// Kernel trait for dense correlation scans.
pub trait Kernel {
    /// Computes the correlation series over all valid placements.
    ///
    /// Returns an empty vector when the segment is shorter than the
    /// template. Flat-line windows and flat-line templates yield 0.
    fn scan(plan: &TemplatePlan, samples: &[f32]) -> Vec<f32>;
}

/// Execution backend for the correlation scan, selected by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Portable scalar kernel.
    Scalar,
    /// Vectorized kernel (requires the `simd` feature).
    Simd,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Scalar => "scalar",
            Backend::Simd => "simd",
        }
    }

    /// Whether the backend is compiled into this build.
    pub fn is_available(self) -> bool {
        match self {
            Backend::Scalar => true,
            Backend::Simd => cfg!(feature = "simd"),
        }
    }

    /// Resolves the configured backend against this build, falling back to
    /// the scalar kernel when permitted.
    pub fn resolve(self, allow_fallback: bool) -> MatchResult<Backend> {
        if self.is_available() {
            return Ok(self);
        }
        if allow_fallback {
            warn!(
                requested = self.name(),
                "backend not available, falling back to scalar kernel"
            );
            return Ok(Backend::Scalar);
        }
        Err(MatchError::BackendUnavailable {
            requested: self.name(),
        })
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Scalar
    }
}

/// Floor below which a centered sum of squares counts as flat-line.
pub(crate) fn flat_floor(n: usize) -> f64 {
    (f32::EPSILON as f64 * n as f64).sqrt()
}

/// Centered sum of squares of every length-`n` window, via f64 prefix sums.
///
/// Element `i` is `sum(w^2) - sum(w)^2 / n` for the window starting at
/// sample `i`, which equals `n * var(w)`. O(Ns) for the whole segment.
pub(crate) fn window_sum_sq(samples: &[f32], n: usize) -> Vec<f64> {
    debug_assert!(n >= 1 && samples.len() >= n);
    let count = samples.len() - n + 1;

    let mut prefix = Vec::with_capacity(samples.len() + 1);
    let mut prefix_sq = Vec::with_capacity(samples.len() + 1);
    let mut s = 0.0f64;
    let mut s2 = 0.0f64;
    prefix.push(0.0);
    prefix_sq.push(0.0);
    for &v in samples {
        let v = v as f64;
        s += v;
        s2 += v * v;
        prefix.push(s);
        prefix_sq.push(s2);
    }

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let sum = prefix[i + n] - prefix[i];
        let sum_sq = prefix_sq[i + n] - prefix_sq[i];
        out.push((sum_sq - sum * sum / n as f64).max(0.0));
    }
    out
}
