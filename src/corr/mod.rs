//! Normalized cross-correlation of one template against one channel-day.
//!
//! `correlate` is a pure function over its inputs: it validates the pair,
//! dispatches the dense scan to the configured kernel, and applies the
//! corrupt-data guard. The resulting `CorrelationSeries` is transient; it is
//! consumed immediately by the daily statistics and the detector.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::kernel::scalar::ScalarKernel;
use crate::kernel::{Backend, Kernel};
use crate::util::{MatchError, MatchResult};
use crate::waveform::ContinuousSegment;

pub mod plan;

pub use plan::TemplatePlan;

/// Relative sample-rate tolerance between template and segment.
const RATE_TOLERANCE: f64 = 1e-6;

/// Correlation values above this magnitude indicate corrupt input data and
/// are zeroed.
const CORRUPT_CC_LIMIT: f32 = 1.01;

/// Dense sequence of normalized cross-correlation coefficients, one per
/// placement of the template along the segment.
#[derive(Debug)]
pub struct CorrelationSeries {
    values: Vec<f32>,
    start_time: DateTime<Utc>,
    sample_rate: f64,
}

impl CorrelationSeries {
    /// Wraps precomputed correlation values with their time base.
    pub fn new(values: Vec<f32>, start_time: DateTime<Utc>, sample_rate: f64) -> Self {
        Self {
            values,
            start_time,
            sample_rate,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Start time of the underlying segment; placement `i` aligns the
    /// template start at `time_at(i)`.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Absolute time of placement `i`.
    pub fn time_at(&self, i: usize) -> DateTime<Utc> {
        let micros = (i as f64 / self.sample_rate * 1e6).round() as i64;
        self.start_time + Duration::microseconds(micros)
    }
}

/// Computes the normalized cross-correlation series of a template plan
/// against one continuous segment.
///
/// A segment shorter than the template yields an empty series. Non-finite
/// samples and mismatched sample rates are data-quality errors. Inputs are
/// not mutated.
pub fn correlate(
    plan: &TemplatePlan,
    segment: &ContinuousSegment,
    backend: Backend,
) -> MatchResult<CorrelationSeries> {
    let rate = segment.sample_rate();
    if (rate - plan.sample_rate()).abs() > RATE_TOLERANCE * plan.sample_rate() {
        return Err(MatchError::SampleRateMismatch {
            template: plan.sample_rate(),
            segment: rate,
        });
    }

    let samples = segment.samples();
    let bad = samples.iter().filter(|v| !v.is_finite()).count();
    if bad > 0 {
        return Err(MatchError::DataQuality {
            reason: format!("segment contains {bad} non-finite sample(s)"),
        });
    }

    let mut values = scan(plan, samples, backend)?;

    // when data is corrupt the normalization can blow up past 1
    let mut clipped = 0usize;
    for v in &mut values {
        if v.abs() > CORRUPT_CC_LIMIT {
            *v = 0.0;
            clipped += 1;
        }
    }
    if clipped > 0 {
        warn!(
            channel = %segment.channel(),
            day = %segment.day(),
            clipped,
            "correlation exceeded 1.0, zeroing affected values"
        );
    }

    Ok(CorrelationSeries {
        values,
        start_time: segment.start_time(),
        sample_rate: rate,
    })
}

fn scan(plan: &TemplatePlan, samples: &[f32], backend: Backend) -> MatchResult<Vec<f32>> {
    match backend {
        Backend::Scalar => Ok(ScalarKernel::scan(plan, samples)),
        Backend::Simd => {
            #[cfg(feature = "simd")]
            {
                Ok(crate::kernel::simd::SimdKernel::scan(plan, samples))
            }
            #[cfg(not(feature = "simd"))]
            {
                Err(MatchError::BackendUnavailable {
                    requested: backend.name(),
                })
            }
        }
    }
}
