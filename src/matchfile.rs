//! On-disk match and event-family files.
//!
//! Match files carry one detection per line:
//! `2021005T032928.7783Z 0.812 12.431 9.999E-01`
//! (day-of-year time, cc, cc/MAD, amplitude ratio). Family files carry one
//! multi-station detection per line with comma-joined, arrival-ordered
//! per-channel lists. Both formats are stable interchange formats and must
//! be reproduced exactly.
//!
//! Files are completed atomically: content is written to a sibling
//! temporary file and renamed into place, so a reader never observes a
//! partially written file.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::detect::DetectionRecord;
use crate::family::{EventFamily, FamilyDetection};
use crate::timefmt;
use crate::util::{MatchError, MatchResult};
use crate::waveform::{ChannelId, EventId};

/// File name shared by a template and its match file:
/// `{channel}_{event}_{npts}`.
pub fn file_name(channel: &ChannelId, event: &EventId, npts: usize) -> String {
    format!("{channel}_{event}_{npts}")
}

/// Splits a `{channel}_{event}_{npts}` file name into its parts.
pub fn parse_file_name(name: &str) -> MatchResult<(ChannelId, EventId, usize)> {
    let err = || MatchError::MalformedFileName(name.to_string());
    let mut parts = name.split('_');
    let (Some(channel), Some(event), Some(npts), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(err());
    };
    Ok((
        ChannelId::from_str(channel)?,
        EventId::from_str(event)?,
        npts.parse().map_err(|_| err())?,
    ))
}

/// Writes a match file atomically, one detection per line in time order.
pub fn write_matches(path: &Path, records: &[DetectionRecord]) -> MatchResult<()> {
    let mut out = String::new();
    for record in records {
        out.push_str(&format_detection_line(record));
        out.push('\n');
    }
    atomic_write(path, &out)
}

/// Parses a match file back into detection records.
pub fn read_matches(path: &Path) -> MatchResult<Vec<DetectionRecord>> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_detection_line)
        .collect()
}

/// Writes an event-family file atomically, one qualifying detection per
/// line in time order. An empty family produces an empty file.
pub fn write_family(path: &Path, family: &EventFamily) -> MatchResult<()> {
    let mut out = String::new();
    for detection in family.detections() {
        out.push_str(&format_family_line(detection));
        out.push('\n');
    }
    atomic_write(path, &out)
}

/// Parses an event-family file back into family detections.
pub fn read_family(path: &Path) -> MatchResult<Vec<FamilyDetection>> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_family_line)
        .collect()
}

fn format_detection_line(record: &DetectionRecord) -> String {
    format!(
        "{} {:.3} {:.3} {}",
        timefmt::format_day_of_year(record.time),
        record.cc,
        record.cc_over_mad,
        format_sci(record.amplitude_ratio)
    )
}

fn parse_detection_line(line: &str) -> MatchResult<DetectionRecord> {
    let err = || MatchError::MalformedRecord {
        what: "detection",
        line: line.to_string(),
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [time, cc, cc_over_mad, amplitude_ratio] = fields.as_slice() else {
        return Err(err());
    };
    Ok(DetectionRecord {
        time: timefmt::parse_day_of_year(time)?,
        cc: cc.parse().map_err(|_| err())?,
        cc_over_mad: cc_over_mad.parse().map_err(|_| err())?,
        amplitude_ratio: amplitude_ratio.parse().map_err(|_| err())?,
    })
}

fn format_family_line(detection: &FamilyDetection) -> String {
    format!(
        "{} {} {} {} {}",
        timefmt::format_iso_micros(detection.origin_time),
        join(detection.channels.iter().map(ToString::to_string)),
        join(detection.cc.iter().map(|v| format!("{v:.3}"))),
        join(detection.cc_over_mad.iter().map(|v| format!("{v:.3}"))),
        join(detection.amplitude_ratio.iter().map(|v| format_sci(*v))),
    )
}

fn parse_family_line(line: &str) -> MatchResult<FamilyDetection> {
    let err = || MatchError::MalformedRecord {
        what: "family",
        line: line.to_string(),
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [time, channels, ccs, mads, amps] = fields.as_slice() else {
        return Err(err());
    };
    let channels: Vec<ChannelId> = channels
        .split(',')
        .map(ChannelId::from_str)
        .collect::<MatchResult<_>>()?;
    let parse_list = |field: &str| -> MatchResult<Vec<f32>> {
        field
            .split(',')
            .map(|v| v.parse().map_err(|_| err()))
            .collect()
    };
    let detection = FamilyDetection {
        origin_time: timefmt::parse_iso_micros(time)?,
        channels,
        cc: parse_list(ccs)?,
        cc_over_mad: parse_list(mads)?,
        amplitude_ratio: parse_list(amps)?,
    };
    if detection.cc.len() != detection.channels.len()
        || detection.cc_over_mad.len() != detection.channels.len()
        || detection.amplitude_ratio.len() != detection.channels.len()
    {
        return Err(err());
    }
    Ok(detection)
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(",")
}

/// Scientific notation with three decimals and a signed two-digit
/// exponent (`9.999E-01`), matching the historical match-file format.
fn format_sci(value: f32) -> String {
    if value == 0.0 || !value.is_finite() {
        return String::from("0.000E+00");
    }
    let rendered = format!("{value:.3e}");
    let Some((mantissa, exponent)) = rendered.split_once('e') else {
        return rendered;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}E{sign}{:02}", exponent.abs())
}

fn atomic_write(path: &Path, contents: &str) -> MatchResult<()> {
    let tmp = sibling_tmp(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
