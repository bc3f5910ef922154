//! Scalar reference kernel.

use crate::corr::plan::TemplatePlan;
use crate::kernel::{flat_floor, window_sum_sq, Kernel};

/// Portable scalar correlation kernel; the reference for all backends.
pub struct ScalarKernel;

impl Kernel for ScalarKernel {
    fn scan(plan: &TemplatePlan, samples: &[f32]) -> Vec<f32> {
        let n = plan.len();
        if samples.len() < n {
            return Vec::new();
        }
        let count = samples.len() - n + 1;
        if plan.is_flat() {
            return vec![0.0; count];
        }

        let ss = window_sum_sq(samples, n);
        let floor = flat_floor(n);
        let zero_mean = plan.zero_mean();
        let norm_t = plan.norm();

        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            if ss[i] <= floor {
                out.push(0.0);
                continue;
            }
            let window = &samples[i..i + n];
            let mut dot = 0.0f32;
            for (t, w) in zero_mean.iter().zip(window) {
                dot += t * w;
            }
            out.push(dot / (norm_t * (ss[i] as f32).sqrt()));
        }
        out
    }
}
