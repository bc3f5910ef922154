//! SIMD-accelerated kernel using the `wide` crate.
//!
//! The dot product of the zero-mean template against each window is
//! vectorized to process 8 samples at a time with `f32x8`; the sliding
//! normalization is shared with the scalar kernel.

use wide::f32x8;

use crate::corr::plan::TemplatePlan;
use crate::kernel::{flat_floor, window_sum_sq, Kernel};

const LANES: usize = 8;

/// Load 8 f32 values into f32x8.
#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Horizontal sum of f32x8.
#[inline]
fn hsum(v: f32x8) -> f32 {
    let arr = v.to_array();
    arr[0] + arr[1] + arr[2] + arr[3] + arr[4] + arr[5] + arr[6] + arr[7]
}

/// Vectorized correlation kernel.
pub struct SimdKernel;

impl Kernel for SimdKernel {
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
        let simd_end = n / LANES * LANES;

        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            if ss[i] <= floor {
                out.push(0.0);
                continue;
            }
            let window = &samples[i..i + n];

            let mut dot_vec = f32x8::ZERO;
            let mut j = 0;
            while j < simd_end {
                dot_vec += load_f32x8(&zero_mean[j..]) * load_f32x8(&window[j..]);
                j += LANES;
            }
            let mut dot = hsum(dot_vec);
            while j < n {
                dot += zero_mean[j] * window[j];
                j += 1;
            }

            out.push(dot / (norm_t * (ss[i] as f32).sqrt()));
        }
        out
    }
}
