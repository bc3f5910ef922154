//! Timestamp formats used in match and family files.
//!
//! Match files use a compact day-of-year form, `2021005T032928.7783Z`
//! (four fractional digits, i.e. 0.1 ms resolution, truncated). Family
//! files use ISO-8601 with microseconds, `2021-01-05T03:29:28.778300Z`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::util::{MatchError, MatchResult};

/// Formats a timestamp in the day-of-year form used by match files and
/// template-event identifiers.
pub fn format_day_of_year(t: DateTime<Utc>) -> String {
    format!(
        "{:04}{:03}T{:02}{:02}{:02}.{:04}Z",
        t.year(),
        t.ordinal(),
        t.hour(),
        t.minute(),
        t.second(),
        t.timestamp_subsec_micros() / 100
    )
}

/// Parses a day-of-year timestamp such as `2021005T032928.7783Z`.
pub fn parse_day_of_year(s: &str) -> MatchResult<DateTime<Utc>> {
    let err = || MatchError::MalformedTimestamp(s.to_string());

    let body = s.strip_suffix('Z').ok_or_else(err)?;
    let (date_part, time_part) = body.split_once('T').ok_or_else(err)?;
    if date_part.len() != 7 {
        return Err(err());
    }
    let year: i32 = date_part[..4].parse().map_err(|_| err())?;
    let ordinal: u32 = date_part[4..].parse().map_err(|_| err())?;

    let (clock, frac) = time_part.split_once('.').ok_or_else(err)?;
    if clock.len() != 6 || frac.is_empty() || frac.len() > 6 {
        return Err(err());
    }
    let hour: u32 = clock[..2].parse().map_err(|_| err())?;
    let minute: u32 = clock[2..4].parse().map_err(|_| err())?;
    let second: u32 = clock[4..].parse().map_err(|_| err())?;
    let frac_value: u32 = frac.parse().map_err(|_| err())?;
    let micros = frac_value * 10u32.pow(6 - frac.len() as u32);

    NaiveDate::from_yo_opt(year, ordinal)
        .and_then(|d| d.and_hms_micro_opt(hour, minute, second, micros))
        .map(|naive| naive.and_utc())
        .ok_or_else(err)
}

/// Formats a timestamp as ISO-8601 with microseconds, `Z`-suffixed.
pub fn format_iso_micros(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Parses an ISO-8601 timestamp with fractional seconds and `Z` suffix.
pub fn parse_iso_micros(s: &str) -> MatchResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .map_err(|_| MatchError::MalformedTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_of_year_round_trip() {
        let t = parse_day_of_year("2021005T032928.7783Z").unwrap();
        assert_eq!(format_day_of_year(t), "2021005T032928.7783Z");
        assert_eq!(t.year(), 2021);
        assert_eq!(t.ordinal(), 5);
        assert_eq!(t.hour(), 3);
        assert_eq!(t.timestamp_subsec_micros(), 778_300);
    }

    #[test]
    fn day_of_year_truncates_to_tenths_of_millis() {
        let t = parse_day_of_year("2021005T032907.3800Z").unwrap()
            + chrono::Duration::microseconds(99);
        assert_eq!(format_day_of_year(t), "2021005T032907.3800Z");
    }

    #[test]
    fn day_of_year_rejects_garbage() {
        assert!(parse_day_of_year("2021005T032928.7783").is_err());
        assert!(parse_day_of_year("2021-005T032928.7783Z").is_err());
        assert!(parse_day_of_year("2021005T032928Z").is_err());
        assert!(parse_day_of_year("2021400T032928.7783Z").is_err());
    }

    #[test]
    fn iso_micros_round_trip() {
        let t = parse_day_of_year("2021005T032907.3800Z").unwrap();
        let s = format_iso_micros(t);
        assert_eq!(s, "2021-01-05T03:29:07.380000Z");
        assert_eq!(parse_iso_micros(&s).unwrap(), t);
    }
}
