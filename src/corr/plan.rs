//! Template plan precomputation for normalized cross-correlation.

use crate::util::{MatchError, MatchResult};
use crate::waveform::{peak_amplitude, Template};

/// Precomputed statistics and zero-mean buffer for one template.
///
/// A plan is built once per template and shared read-only by every
/// channel-day correlation against it. Because the zero-mean buffer sums to
/// zero, the window-mean term of the correlation numerator vanishes and the
/// kernels can take a plain dot product against the raw window.
#[derive(Debug)]
pub struct TemplatePlan {
    zero_mean: Vec<f32>,
    norm: f32,
    peak_amplitude: f32,
    sample_rate: f64,
}

impl TemplatePlan {
    /// Builds a plan from a template waveform.
    ///
    /// Non-finite samples are a data-quality error. A flat-line template
    /// (zero variance) is tolerated: its norm is stored as 0 and every
    /// correlation value it produces is defined as 0.
    pub fn build(template: &Template) -> MatchResult<Self> {
        let samples = template.samples();
        let bad = samples.iter().filter(|v| !v.is_finite()).count();
        if bad > 0 {
            return Err(MatchError::DataQuality {
                reason: format!("template contains {bad} non-finite sample(s)"),
            });
        }

        let n = samples.len();
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for &v in samples {
            let v = v as f64;
            sum += v;
            sum_sq += v * v;
        }
        let mean = sum / n as f64;
        // centered sum of squares, clamped against rounding
        let ss = (sum_sq - sum * sum / n as f64).max(0.0);
        let norm = if ss <= crate::kernel::flat_floor(n) {
            0.0
        } else {
            ss.sqrt() as f32
        };

        let zero_mean = samples.iter().map(|&v| (v as f64 - mean) as f32).collect();

        Ok(Self {
            zero_mean,
            norm,
            peak_amplitude: peak_amplitude(samples),
            sample_rate: template.sample_rate(),
        })
    }

    /// Template length in samples.
    pub fn len(&self) -> usize {
        self.zero_mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zero_mean.is_empty()
    }

    /// Zero-mean template buffer.
    pub fn zero_mean(&self) -> &[f32] {
        &self.zero_mean
    }

    /// Euclidean norm of the zero-mean buffer; 0 for a flat-line template.
    pub fn norm(&self) -> f32 {
        self.norm
    }

    /// True when the template has zero variance.
    pub fn is_flat(&self) -> bool {
        self.norm == 0.0
    }

    /// Largest absolute amplitude of the raw template waveform.
    pub fn peak_amplitude(&self) -> f32 {
        self.peak_amplitude
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
