//! Matching and association pipelines.
//!
//! Each (template, channel-day) correlation is an independent unit of work
//! over immutable shared inputs; units are distributed over a bounded
//! worker pool (feature `rayon`) or run serially without it. A unit either
//! completes and contributes to its template's match file or fails and is
//! reported with enough identity for a targeted re-run; isolated failures
//! never abort the run. Match files are written once per template via an
//! atomic rename, which also makes re-runs resumable: templates whose
//! match file already exists are skipped up front.

use std::fs;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corr::{self, TemplatePlan};
use crate::detect::{self, DetectionRecord};
use crate::family::{self, ChannelMatches};
use crate::kernel::Backend;
use crate::matchfile;
use crate::provider::{SegmentProvider, TemplateProvider};
use crate::stats::DailyStats;
use crate::util::MatchResult;
use crate::waveform::{ChannelId, EventId, Template};

/// One failed unit of work, with enough identity for a targeted re-run.
#[derive(Debug)]
pub struct UnitFailure {
    /// Template or event file name the unit belongs to.
    pub unit: String,
    /// Day of continuous data, when the failure is day-scoped.
    pub day: Option<NaiveDate>,
    pub error: String,
}

/// Outcome of a matching run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Templates whose match file was written in this run.
    pub templates_matched: usize,
    /// Templates skipped because their match file already existed.
    pub templates_skipped: usize,
    /// Channel-days without continuous data.
    pub days_missing: usize,
    /// Total detections written.
    pub detections: usize,
    pub failures: Vec<UnitFailure>,
}

/// Outcome of a family-association run.
#[derive(Debug, Default)]
pub struct FamilySummary {
    /// Template events processed (one family file each).
    pub events: usize,
    /// Total qualifying family detections written.
    pub detections: usize,
    pub failures: Vec<UnitFailure>,
}

/// Correlates every template against the configured date span and writes
/// one match file per template.
pub fn run_matching<S>(
    config: &Config,
    templates: &[Template],
    segments: &S,
) -> MatchResult<RunSummary>
where
    S: SegmentProvider + Sync,
{
    fs::create_dir_all(&config.matches_dir)?;
    let backend = config.backend.resolve(config.allow_backend_fallback)?;
    let days = day_span(config.data_start, config.data_stop);

    let mut summary = RunSummary::default();
    let mut pending: Vec<&Template> = Vec::new();
    for template in templates {
        if config.matches_dir.join(template.file_name()).exists() {
            debug!(template = %template.file_name(), "match file exists, skipping");
            summary.templates_skipped += 1;
        } else {
            pending.push(template);
        }
    }
    if pending.is_empty() {
        info!("no unprocessed templates found");
        return Ok(summary);
    }
    info!(
        templates = pending.len(),
        days = days.len(),
        backend = backend.name(),
        "starting template matching"
    );

    let outcomes = map_units(config.n_workers, &pending, |&template| {
        match_one(config, template, &days, segments, backend)
    })?;

    for outcome in outcomes {
        summary.days_missing += outcome.days_missing;
        summary.detections += outcome.detections;
        if outcome.written {
            summary.templates_matched += 1;
        }
        summary.failures.extend(outcome.failures);
    }
    info!(
        matched = summary.templates_matched,
        skipped = summary.templates_skipped,
        detections = summary.detections,
        failed_units = summary.failures.len(),
        "finished template matching"
    );
    Ok(summary)
}

#[derive(Default)]
struct TemplateOutcome {
    written: bool,
    days_missing: usize,
    detections: usize,
    failures: Vec<UnitFailure>,
}

fn match_one<S>(
    config: &Config,
    template: &Template,
    days: &[NaiveDate],
    segments: &S,
    backend: Backend,
) -> TemplateOutcome
where
    S: SegmentProvider + Sync,
{
    let name = template.file_name();
    let mut outcome = TemplateOutcome::default();

    let plan = match TemplatePlan::build(template) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(template = %name, error = %e, "cannot build template plan");
            outcome.failures.push(UnitFailure {
                unit: name,
                day: None,
                error: e.to_string(),
            });
            return outcome;
        }
    };

    let mut records: Vec<DetectionRecord> = Vec::new();
    for &day in days {
        let segment = match segments.segment(template.channel(), day) {
            Ok(Some(segment)) => segment,
            Ok(None) => {
                debug!(template = %name, %day, "no continuous data");
                outcome.days_missing += 1;
                continue;
            }
            Err(e) => {
                warn!(template = %name, %day, error = %e, "unit failed");
                outcome.failures.push(UnitFailure {
                    unit: name.clone(),
                    day: Some(day),
                    error: e.to_string(),
                });
                continue;
            }
        };
        let series = match corr::correlate(&plan, &segment, backend) {
            Ok(series) => series,
            Err(e) => {
                warn!(template = %name, %day, error = %e, "unit failed");
                outcome.failures.push(UnitFailure {
                    unit: name.clone(),
                    day: Some(day),
                    error: e.to_string(),
                });
                continue;
            }
        };
        let stats = DailyStats::from_series(&series);
        let found = detect::scan_detections(&series, &stats, &segment, &plan, &config.thresholds);
        if !found.is_empty() {
            debug!(template = %name, %day, count = found.len(), "detections");
        }
        records.extend(found);
    }

    records.sort_by_key(|r| r.time);
    match matchfile::write_matches(&config.matches_dir.join(&name), &records) {
        Ok(()) => {
            outcome.written = true;
            outcome.detections = records.len();
        }
        Err(e) => {
            warn!(template = %name, error = %e, "cannot write match file");
            outcome.failures.push(UnitFailure {
                unit: name,
                day: None,
                error: e.to_string(),
            });
        }
    }
    outcome
}

/// Merges match files into event families and writes one family file per
/// template event. `only` restricts processing to the named match files;
/// an empty list processes everything in the matches folder.
pub fn run_families<T>(config: &Config, templates: &T, only: &[String]) -> MatchResult<FamilySummary>
where
    T: TemplateProvider + Sync,
{
    fs::create_dir_all(&config.family_dir)?;
    config.criteria.validate()?;

    let mut grouped: Vec<(EventId, Vec<(String, ChannelId, usize)>)> = Vec::new();
    for name in match_file_names(config, only)? {
        let (channel, event, npts) = match matchfile::parse_file_name(&name) {
            Ok(parts) => parts,
            Err(_) => {
                warn!(file = %name, "skipping non-match file in matches dir");
                continue;
            }
        };
        match grouped.iter_mut().find(|(e, _)| *e == event) {
            Some((_, members)) => members.push((name, channel, npts)),
            None => grouped.push((event, vec![(name, channel, npts)])),
        }
    }
    grouped.sort_by_key(|(event, _)| *event);
    info!(events = grouped.len(), "merging detections into event families");

    let outcomes = map_units(config.n_workers, &grouped, |(event, members)| {
        associate_one(config, templates, *event, members)
    })?;

    let mut summary = FamilySummary::default();
    for outcome in outcomes {
        summary.events += 1;
        summary.detections += outcome.detections;
        summary.failures.extend(outcome.failures);
    }
    info!(
        events = summary.events,
        detections = summary.detections,
        failed_units = summary.failures.len(),
        "finished merging detections"
    );
    Ok(summary)
}

#[derive(Default)]
struct EventOutcome {
    detections: usize,
    failures: Vec<UnitFailure>,
}

fn associate_one<T>(
    config: &Config,
    templates: &T,
    event: EventId,
    members: &[(String, ChannelId, usize)],
) -> EventOutcome
where
    T: TemplateProvider,
{
    let mut outcome = EventOutcome::default();
    let mut sets: Vec<ChannelMatches> = Vec::new();

    for (name, channel, npts) in members {
        let records = match matchfile::read_matches(&config.matches_dir.join(name)) {
            Ok(records) => records,
            Err(e) => {
                warn!(file = %name, error = %e, "cannot read match file");
                outcome.failures.push(UnitFailure {
                    unit: name.clone(),
                    day: None,
                    error: e.to_string(),
                });
                continue;
            }
        };
        let template = match templates.template(channel, &event, *npts) {
            Ok(Some(template)) => template,
            Ok(None) => {
                warn!(file = %name, "no template for match file, cannot align channel");
                outcome.failures.push(UnitFailure {
                    unit: name.clone(),
                    day: None,
                    error: "template waveform not found".to_string(),
                });
                continue;
            }
            Err(e) => {
                warn!(file = %name, error = %e, "cannot read template");
                outcome.failures.push(UnitFailure {
                    unit: name.clone(),
                    day: None,
                    error: e.to_string(),
                });
                continue;
            }
        };
        sets.push(ChannelMatches {
            channel: channel.clone(),
            origin_offset: template.origin_offset(),
            records,
        });
    }

    let family = family::associate(event, &sets, &config.criteria);
    debug!(event = %event, detections = family.len(), "event family built");
    match matchfile::write_family(&config.family_dir.join(event.to_string()), &family) {
        Ok(()) => outcome.detections = family.len(),
        Err(e) => {
            warn!(event = %event, error = %e, "cannot write family file");
            outcome.failures.push(UnitFailure {
                unit: event.to_string(),
                day: None,
                error: e.to_string(),
            });
        }
    }
    outcome
}

fn match_file_names(config: &Config, only: &[String]) -> MatchResult<Vec<String>> {
    if !only.is_empty() {
        return Ok(only.to_vec());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(&config.matches_dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// All days in the configured span, inclusive on both ends.
fn day_span(start: NaiveDate, stop: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day <= stop {
        days.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

#[cfg(feature = "rayon")]
fn map_units<T, R, F>(n_workers: usize, items: &[T], f: F) -> MatchResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers)
        .build()
        .map_err(|e| crate::util::MatchError::WorkerPool(e.to_string()))?;
    Ok(pool.install(|| items.par_iter().map(&f).collect()))
}

#[cfg(not(feature = "rayon"))]
fn map_units<T, R, F>(_n_workers: usize, items: &[T], f: F) -> MatchResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    Ok(items.iter().map(f).collect())
}
