//! Synthetic validation of the correlation engine.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use quakematch::{correlate, Backend, ChannelId, ContinuousSegment, EventId, MatchError, Template, TemplatePlan};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const RATE: f64 = 25.0;

fn channel() -> ChannelId {
    "CX.PB01..HHZ".parse().unwrap()
}

fn event() -> EventId {
    "2021005T032907.3800Z".parse().unwrap()
}

fn day_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 5, 0, 0, 0).unwrap()
}

fn make_noise(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

fn make_template(samples: Vec<f32>) -> Template {
    Template::new(samples, RATE, day_start(), channel(), event(), 45.0).unwrap()
}

fn make_segment(samples: Vec<f32>) -> ContinuousSegment {
    let day = NaiveDate::from_ymd_opt(2021, 1, 5).unwrap();
    ContinuousSegment::new(samples, RATE, day_start(), channel(), day).unwrap()
}

#[test]
fn exact_copy_scores_one_at_offset() {
    let data = make_noise(4000, 7);
    let offset = 1200;
    let template = make_template(data[offset..offset + 150].to_vec());
    let plan = TemplatePlan::build(&template).unwrap();

    let series = correlate(&plan, &make_segment(data), Backend::Scalar).unwrap();
    assert_eq!(series.len(), 4000 - 150 + 1);

    let peak = series.values()[offset];
    assert!((peak - 1.0).abs() < 1e-5, "peak {peak}");
    for (i, v) in series.values().iter().enumerate() {
        assert!(v.abs() <= 1.0 + 1e-5, "cc out of range at {i}: {v}");
    }
    let argmax = series
        .values()
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(argmax, offset);
}

#[test]
fn scaling_does_not_change_the_score() {
    let data = make_noise(2000, 11);
    let offset = 800;
    let scaled: Vec<f32> = data[offset..offset + 120].iter().map(|v| v * 37.5).collect();
    let plan = TemplatePlan::build(&make_template(scaled)).unwrap();

    let series = correlate(&plan, &make_segment(data), Backend::Scalar).unwrap();
    assert!((series.values()[offset] - 1.0).abs() < 1e-5);
}

#[test]
fn inverted_copy_scores_minus_one() {
    let data = make_noise(2000, 13);
    let offset = 500;
    let inverted: Vec<f32> = data[offset..offset + 100].iter().map(|v| -v).collect();
    let plan = TemplatePlan::build(&make_template(inverted)).unwrap();

    let series = correlate(&plan, &make_segment(data), Backend::Scalar).unwrap();
    assert!((series.values()[offset] + 1.0).abs() < 1e-5);
}

#[test]
fn flat_template_yields_zero_series() {
    let plan = TemplatePlan::build(&make_template(vec![2.5; 100])).unwrap();
    assert!(plan.is_flat());

    let series = correlate(&plan, &make_segment(make_noise(1000, 3)), Backend::Scalar).unwrap();
    assert_eq!(series.len(), 1000 - 100 + 1);
    assert!(series.values().iter().all(|&v| v == 0.0));
}

#[test]
fn flat_window_yields_zero_not_nan() {
    let mut data = make_noise(1000, 5);
    for v in &mut data[400..600] {
        *v = 0.75;
    }
    let template = make_template(make_noise(100, 6));
    let plan = TemplatePlan::build(&template).unwrap();

    let series = correlate(&plan, &make_segment(data), Backend::Scalar).unwrap();
    // placements fully inside the constant stretch
    for i in 420..=480 {
        assert_eq!(series.values()[i], 0.0, "placement {i}");
    }
    assert!(series.values().iter().all(|v| v.is_finite()));
}

#[test]
fn segment_shorter_than_template_yields_empty_series() {
    let plan = TemplatePlan::build(&make_template(make_noise(200, 1))).unwrap();
    let series = correlate(&plan, &make_segment(make_noise(50, 2)), Backend::Scalar).unwrap();
    assert!(series.is_empty());
}

#[test]
fn non_finite_segment_is_a_data_quality_error() {
    let plan = TemplatePlan::build(&make_template(make_noise(100, 1))).unwrap();
    let mut data = make_noise(1000, 2);
    data[512] = f32::NAN;
    let err = correlate(&plan, &make_segment(data), Backend::Scalar).unwrap_err();
    assert!(matches!(err, MatchError::DataQuality { .. }));
}

#[test]
fn non_finite_template_is_rejected_at_plan_build() {
    let mut samples = make_noise(100, 1);
    samples[10] = f32::INFINITY;
    let err = TemplatePlan::build(&make_template(samples)).unwrap_err();
    assert!(matches!(err, MatchError::DataQuality { .. }));
}

#[test]
fn sample_rate_mismatch_is_rejected() {
    let plan = TemplatePlan::build(&make_template(make_noise(100, 1))).unwrap();
    let day = NaiveDate::from_ymd_opt(2021, 1, 5).unwrap();
    let segment =
        ContinuousSegment::new(make_noise(1000, 2), 100.0, day_start(), channel(), day).unwrap();
    let err = correlate(&plan, &segment, Backend::Scalar).unwrap_err();
    assert!(matches!(err, MatchError::SampleRateMismatch { .. }));
}

#[test]
fn placement_times_follow_the_sample_interval() {
    let plan = TemplatePlan::build(&make_template(make_noise(100, 1))).unwrap();
    let series = correlate(&plan, &make_segment(make_noise(1000, 2)), Backend::Scalar).unwrap();
    assert_eq!(series.time_at(0), day_start());
    assert_eq!(
        series.time_at(25),
        day_start() + chrono::Duration::seconds(1)
    );
}
