//! Waveform containers and identities.
//!
//! `Template` is a short reference waveform cut around a known event;
//! `ContinuousSegment` is one channel-day of continuous data. Both are
//! immutable after construction and shared read-only across all correlation
//! units that consume them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};

use crate::timefmt;
use crate::util::{MatchError, MatchResult};

/// Channel identity of the form `NET.STA.LOC.CHA` (location may be empty).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId {
    network: String,
    station: String,
    location: String,
    channel: String,
}

impl ChannelId {
    /// Creates a channel identity from its four code parts.
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl FromStr for ChannelId {
    type Err = MatchError;

    fn from_str(s: &str) -> MatchResult<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [net, sta, loc, cha] if !net.is_empty() && !sta.is_empty() && !cha.is_empty() => {
                Ok(Self::new(net, sta, loc, cha))
            }
            _ => Err(MatchError::MalformedChannelId(s.to_string())),
        }
    }
}

/// Template-event identifier: the origin time of the event the template was
/// extracted from, rendered in day-of-year form (`2021005T032907.3800Z`).
///
/// The textual form is used verbatim in template, match, and family file
/// names; parsing and re-formatting is lossless at 0.1 ms resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(DateTime<Utc>);

impl EventId {
    pub fn new(origin_time: DateTime<Utc>) -> Self {
        Self(origin_time)
    }

    /// Origin time of the template event.
    pub fn origin_time(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&timefmt::format_day_of_year(self.0))
    }
}

impl FromStr for EventId {
    type Err = MatchError;

    fn from_str(s: &str) -> MatchResult<Self> {
        timefmt::parse_day_of_year(s).map(Self)
    }
}

/// Reference waveform extracted around a known event.
pub struct Template {
    samples: Vec<f32>,
    sample_rate: f64,
    start_time: DateTime<Utc>,
    channel: ChannelId,
    event: EventId,
    distance_km: f64,
}

impl Template {
    /// Creates a template from preprocessed samples and metadata.
    pub fn new(
        samples: Vec<f32>,
        sample_rate: f64,
        start_time: DateTime<Utc>,
        channel: ChannelId,
        event: EventId,
        distance_km: f64,
    ) -> MatchResult<Self> {
        if samples.is_empty() {
            return Err(MatchError::DataQuality {
                reason: "empty template waveform".to_string(),
            });
        }
        if !(sample_rate > 0.0) {
            return Err(MatchError::DataQuality {
                reason: format!("non-positive template sample rate {sample_rate}"),
            });
        }
        Ok(Self {
            samples,
            sample_rate,
            start_time,
            channel,
            event,
            distance_km,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn event(&self) -> &EventId {
        &self.event
    }

    /// Approximate hypocentral distance to the recording station, in km.
    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    /// Seconds between the template-event origin and the template window
    /// start. Subtracting this from a detection time yields the detection's
    /// estimated origin time, removing the station's travel-time offset.
    pub fn origin_offset(&self) -> f64 {
        (self.start_time - self.event.origin_time())
            .num_microseconds()
            .map(|us| us as f64 / 1e6)
            .unwrap_or(f64::MAX)
    }

    /// Canonical file name for this template and its match file:
    /// `{channel}_{event}_{npts}`.
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}", self.channel, self.event, self.samples.len())
    }
}

/// One channel-day of continuous data.
pub struct ContinuousSegment {
    samples: Vec<f32>,
    sample_rate: f64,
    start_time: DateTime<Utc>,
    channel: ChannelId,
    day: NaiveDate,
}

impl ContinuousSegment {
    pub fn new(
        samples: Vec<f32>,
        sample_rate: f64,
        start_time: DateTime<Utc>,
        channel: ChannelId,
        day: NaiveDate,
    ) -> MatchResult<Self> {
        if !(sample_rate > 0.0) {
            return Err(MatchError::DataQuality {
                reason: format!("non-positive segment sample rate {sample_rate}"),
            });
        }
        Ok(Self {
            samples,
            sample_rate,
            start_time,
            channel,
            day,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }
}

/// Largest absolute amplitude in a waveform, 0.0 for an empty slice.
pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, v| acc.max(v.abs()))
}
