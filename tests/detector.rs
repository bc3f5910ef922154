//! Detector behavior over crafted correlation series.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use quakematch::{
    scan_detections, ChannelId, ContinuousSegment, CorrelationSeries, DailyStats, EventId,
    Template, TemplatePlan, Thresholds,
};

const RATE: f64 = 25.0;

fn day_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 5, 0, 0, 0).unwrap()
}

fn channel() -> ChannelId {
    "CX.PB01..HHZ".parse().unwrap()
}

/// Builds a 3-sample template plan with peak amplitude 2 and a matching
/// segment long enough for `values.len()` placements.
fn fixture(values: &[f32], segment_samples: Vec<f32>) -> (CorrelationSeries, ContinuousSegment, TemplatePlan) {
    let event: EventId = "2021005T032907.3800Z".parse().unwrap();
    let template = Template::new(
        vec![1.0, 2.0, -1.0],
        RATE,
        day_start(),
        channel(),
        event,
        45.0,
    )
    .unwrap();
    let plan = TemplatePlan::build(&template).unwrap();
    assert_eq!(segment_samples.len(), values.len() + plan.len() - 1);
    let day = NaiveDate::from_ymd_opt(2021, 1, 5).unwrap();
    let segment = ContinuousSegment::new(segment_samples, RATE, day_start(), channel(), day).unwrap();
    let series = CorrelationSeries::new(values.to_vec(), day_start(), RATE);
    (series, segment, plan)
}

fn flat_stats() -> DailyStats {
    // median 0, MAD 0.05
    DailyStats::from_values(&[0.05, 0.0, -0.05, 0.1, 0.0, -0.02, 0.05, -0.05, 0.0])
}

#[test]
fn one_record_per_contiguous_run() {
    let values = [0.0, 0.0, 0.75, 0.92, 0.88, 0.0, 0.0, 0.0, 0.0, 0.0, 0.8, 0.0];
    let segment = vec![0.5; values.len() + 2];
    let (series, segment, plan) = fixture(&values, segment);
    let thresholds = Thresholds {
        cc_threshold: 0.7,
        mad_threshold: 8.0,
        combine_thresholds: true,
    };

    let records = scan_detections(&series, &flat_stats(), &segment, &plan, &thresholds);
    assert_eq!(records.len(), 2);
    // strongest sample of the first run, template-start aligned
    assert_eq!(records[0].time, series.time_at(3));
    assert!((records[0].cc - 0.92).abs() < 1e-6);
    assert_eq!(records[1].time, series.time_at(10));
}

#[test]
fn close_peaks_are_suppressed_within_one_template_length() {
    // two separate runs only two samples apart; template length is 3
    let values = [0.0, 0.9, 0.0, 0.8, 0.0, 0.0, 0.0, 0.0, 0.0, 0.85];
    let segment = vec![0.5; values.len() + 2];
    let (series, segment, plan) = fixture(&values, segment);
    let thresholds = Thresholds {
        cc_threshold: 0.7,
        mad_threshold: 0.0,
        combine_thresholds: true,
    };

    let records = scan_detections(&series, &flat_stats(), &segment, &plan, &thresholds);
    let times: Vec<_> = records.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![series.time_at(1), series.time_at(9)]);
}

#[test]
fn negative_peaks_pass_on_magnitude() {
    let values = [0.0, -0.95, 0.0, 0.0, 0.0, 0.0];
    let segment = vec![0.5; values.len() + 2];
    let (series, segment, plan) = fixture(&values, segment);
    let thresholds = Thresholds {
        cc_threshold: 0.7,
        mad_threshold: 0.0,
        combine_thresholds: true,
    };

    let records = scan_detections(&series, &flat_stats(), &segment, &plan, &thresholds);
    assert_eq!(records.len(), 1);
    assert!(records[0].cc < 0.0);
    assert!(records[0].cc_over_mad < 0.0);
}

#[test]
fn threshold_combination_and_vs_or() {
    // |cc| = 0.5 everywhere below cc_threshold but above 8 * MAD = 0.4
    let values = [0.0, 0.5, 0.0, 0.0];
    let segment = vec![0.5; values.len() + 2];
    let (series, segment, plan) = fixture(&values, segment);
    let stats = flat_stats();

    let and = Thresholds {
        cc_threshold: 0.7,
        mad_threshold: 8.0,
        combine_thresholds: true,
    };
    assert!(scan_detections(&series, &stats, &segment, &plan, &and).is_empty());

    let or = Thresholds {
        combine_thresholds: false,
        ..and
    };
    let records = scan_detections(&series, &stats, &segment, &plan, &or);
    assert_eq!(records.len(), 1);
    assert!((records[0].cc_over_mad - 10.0).abs() < 1e-4);
}

#[test]
fn amplitude_ratio_compares_window_peak_to_template_peak() {
    let values = [0.0, 0.9, 0.0];
    // window for placement 1 is samples [1..4]; its peak is 5.0,
    // template peak is 2.0
    let segment_samples = vec![0.1, 0.2, -5.0, 0.3, 0.1];
    let (series, segment, plan) = fixture(&values, segment_samples);
    let thresholds = Thresholds {
        cc_threshold: 0.7,
        mad_threshold: 0.0,
        combine_thresholds: true,
    };

    let records = scan_detections(&series, &flat_stats(), &segment, &plan, &thresholds);
    assert_eq!(records.len(), 1);
    assert!((records[0].amplitude_ratio - 2.5).abs() < 1e-6);
}

#[test]
fn zero_template_peak_reports_zero_ratio() {
    let event: EventId = "2021005T032907.3800Z".parse().unwrap();
    let template =
        Template::new(vec![0.0, 0.0, 0.0], RATE, day_start(), channel(), event, 45.0).unwrap();
    let plan = TemplatePlan::build(&template).unwrap();
    let day = NaiveDate::from_ymd_opt(2021, 1, 5).unwrap();
    let segment =
        ContinuousSegment::new(vec![0.5; 6], RATE, day_start(), channel(), day).unwrap();
    let series = CorrelationSeries::new(vec![0.0, 0.9, 0.0, 0.0], day_start(), RATE);
    let thresholds = Thresholds {
        cc_threshold: 0.7,
        mad_threshold: 0.0,
        combine_thresholds: true,
    };

    let records = scan_detections(&series, &flat_stats(), &segment, &plan, &thresholds);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].amplitude_ratio, 0.0);
}

#[test]
fn empty_series_yields_no_detections() {
    let (_, segment, plan) = fixture(&[0.0], vec![0.5; 3]);
    let series = CorrelationSeries::new(Vec::new(), day_start(), RATE);
    let thresholds = Thresholds {
        cc_threshold: 0.0,
        mad_threshold: 0.0,
        combine_thresholds: false,
    };
    assert!(scan_detections(&series, &flat_stats(), &segment, &plan, &thresholds).is_empty());
}
