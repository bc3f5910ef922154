//! Threshold detection over a correlation series.
//!
//! The detector reduces a dense correlation series to discrete detections:
//! one representative sample per contiguous threshold-passing run, followed
//! by minimum-separation suppression so that two physical detections closer
//! than one template length cannot both be reported.

use chrono::{DateTime, Utc};

use crate::corr::{CorrelationSeries, TemplatePlan};
use crate::stats::DailyStats;
use crate::waveform::{peak_amplitude, ContinuousSegment};

/// Detection thresholds for one run.
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    /// Minimum absolute correlation value.
    pub cc_threshold: f32,
    /// Minimum absolute correlation value as a multiple of the daily MAD.
    pub mad_threshold: f32,
    /// If true both thresholds must pass (AND); otherwise either suffices.
    pub combine_thresholds: bool,
}

impl Thresholds {
    /// Collapses the two criteria into a single per-day threshold on |cc|:
    /// AND combines as the maximum, OR as the minimum.
    fn local_threshold(&self, mad: f32) -> f32 {
        let mad_component = self.mad_threshold * mad;
        if self.combine_thresholds {
            self.cc_threshold.max(mad_component)
        } else {
            self.cc_threshold.min(mad_component)
        }
    }
}

/// One threshold-passing alignment of a template with the continuous data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionRecord {
    /// Template-start-aligned time of the match.
    pub time: DateTime<Utc>,
    /// Signed normalized correlation value at the peak.
    pub cc: f32,
    /// `cc` divided by the daily MAD.
    pub cc_over_mad: f32,
    /// Peak amplitude of the matched window over the template peak.
    pub amplitude_ratio: f32,
}

/// Extracts detections from one day's correlation series.
///
/// An empty series (segment shorter than the template) yields no
/// detections.
pub fn scan_detections(
    series: &CorrelationSeries,
    stats: &DailyStats,
    segment: &ContinuousSegment,
    plan: &TemplatePlan,
    thresholds: &Thresholds,
) -> Vec<DetectionRecord> {
    let values = series.values();
    if values.is_empty() {
        return Vec::new();
    }

    let threshold = thresholds.local_threshold(stats.mad());
    let peaks = run_peaks(values, threshold);
    let peaks = suppress_close(peaks, values, plan.len());

    let data = segment.samples();
    peaks
        .into_iter()
        .map(|idx| {
            let cc = values[idx];
            let window_peak = peak_amplitude(&data[idx..idx + plan.len()]);
            let amplitude_ratio = if plan.peak_amplitude() == 0.0 {
                0.0
            } else {
                window_peak / plan.peak_amplitude()
            };
            DetectionRecord {
                time: series.time_at(idx),
                cc,
                cc_over_mad: cc / stats.mad(),
                amplitude_ratio,
            }
        })
        .collect()
}

/// One representative sample per maximal contiguous run of passing samples:
/// the largest |cc| in the run, earliest index on ties.
fn run_peaks(values: &[f32], threshold: f32) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut run: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        let a = v.abs();
        if a >= threshold {
            match run {
                Some((_, best)) if a > best => run = Some((i, a)),
                None => run = Some((i, a)),
                _ => {}
            }
        } else if let Some((idx, _)) = run.take() {
            peaks.push(idx);
        }
    }
    if let Some((idx, _)) = run {
        peaks.push(idx);
    }
    peaks
}

/// Discards peaks within `min_distance` samples of a stronger peak.
///
/// Peaks are visited in descending |cc| (earliest index on ties), so the
/// strongest alignment of each physical detection survives.
fn suppress_close(mut peaks: Vec<usize>, values: &[f32], min_distance: usize) -> Vec<usize> {
    if peaks.len() < 2 {
        return peaks;
    }
    peaks.sort_by(|&a, &b| {
        values[b]
            .abs()
            .total_cmp(&values[a].abs())
            .then_with(|| a.cmp(&b))
    });

    let mut kept: Vec<usize> = Vec::with_capacity(peaks.len());
    'outer: for idx in peaks {
        for &k in &kept {
            if idx.abs_diff(k) < min_distance {
                continue 'outer;
            }
        }
        kept.push(idx);
    }
    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_threshold_combines_as_max_or_min() {
        let thr = Thresholds {
            cc_threshold: 0.7,
            mad_threshold: 8.0,
            combine_thresholds: true,
        };
        assert_eq!(thr.local_threshold(0.1), 0.8);
        let thr = Thresholds {
            combine_thresholds: false,
            ..thr
        };
        assert_eq!(thr.local_threshold(0.1), 0.7);
    }

    #[test]
    fn one_peak_per_run() {
        let values = [0.0, 0.8, 0.9, 0.85, 0.0, 0.0, 0.75, 0.0];
        assert_eq!(run_peaks(&values, 0.7), vec![2, 6]);
    }

    #[test]
    fn run_peak_tie_breaks_to_earliest() {
        let values = [0.9, 0.9, 0.8];
        assert_eq!(run_peaks(&values, 0.7), vec![0]);
    }

    #[test]
    fn suppression_keeps_strongest_of_close_pair() {
        let mut values = vec![0.0f32; 32];
        values[4] = 0.8;
        values[10] = 0.95;
        values[25] = 0.75;
        let kept = suppress_close(vec![4, 10, 25], &values, 8);
        assert_eq!(kept, vec![10, 25]);
    }
}
