//! Robust daily statistics of a correlation series.
//!
//! The median absolute deviation of a full channel-day of correlation
//! values is the noise scale against which `cc_over_mad` and the MAD
//! threshold are expressed. It is computed exactly once per (channel, day)
//! and reused for every detection drawn from that day.

use crate::corr::CorrelationSeries;

/// Water level replacing an exactly-zero MAD.
const MAD_FLOOR: f32 = 1e-6;

/// Median and median absolute deviation of one day's correlation values.
#[derive(Clone, Copy, Debug)]
pub struct DailyStats {
    median: f32,
    mad: f32,
}

impl DailyStats {
    pub fn from_series(series: &CorrelationSeries) -> Self {
        Self::from_values(series.values())
    }

    pub fn from_values(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self {
                median: 0.0,
                mad: MAD_FLOOR,
            };
        }
        let med = median(values.to_vec());
        let deviations: Vec<f32> = values.iter().map(|v| (v - med).abs()).collect();
        let mut mad = median(deviations);
        if mad == 0.0 {
            mad = MAD_FLOOR;
        }
        Self { median: med, mad }
    }

    pub fn median(&self) -> f32 {
        self.median
    }

    /// Daily MAD, floored at a small water level so it is safe to divide by.
    pub fn mad(&self) -> f32 {
        self.mad
    }
}

/// Median with averaging of the two middle elements for even lengths.
fn median(mut values: Vec<f32>) -> f32 {
    let n = values.len();
    let mid = n / 2;
    let (left, upper, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let lower = left.iter().fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        (lower + upper) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(vec![1.0]), 1.0);
    }

    #[test]
    fn mad_of_constant_series_hits_water_level() {
        let stats = DailyStats::from_values(&[0.25; 64]);
        assert_eq!(stats.median(), 0.25);
        assert_eq!(stats.mad(), MAD_FLOOR);
    }

    #[test]
    fn mad_matches_hand_computed_value() {
        // median = 0.0, deviations = [0.1, 0.0, 0.1, 0.2, 0.0]
        let stats = DailyStats::from_values(&[0.1, 0.0, -0.1, 0.2, 0.0]);
        assert!((stats.median() - 0.0).abs() < 1e-7);
        assert!((stats.mad() - 0.1).abs() < 1e-7);
    }
}
