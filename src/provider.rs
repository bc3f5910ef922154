//! Template and continuous-data providers.
//!
//! The pipeline consumes waveforms through the two provider traits; absence
//! of data for a channel-day is `Ok(None)`, never an error. The directory
//! implementations here cover the crate's native on-disk layout: template
//! files with a small binary header named `{channel}_{event}_{npts}`, and
//! raw little-endian f32 day files addressed by a configurable path pattern
//! such as
//! `{data_path}/{year}/{net}/{sta}/{cha}.D/{net}.{sta}.{loc}.{cha}.D.{year}.{julday}`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate};
use tracing::warn;

use crate::config::Config;
use crate::matchfile;
use crate::util::{MatchError, MatchResult};
use crate::waveform::{ChannelId, ContinuousSegment, EventId, Template};

/// Yields immutable, preprocessed template waveforms.
pub trait TemplateProvider {
    /// All available templates.
    fn templates(&self) -> MatchResult<Vec<Template>>;

    /// The template for one (channel, event, length) key, or `None` when it
    /// does not exist.
    fn template(
        &self,
        channel: &ChannelId,
        event: &EventId,
        npts: usize,
    ) -> MatchResult<Option<Template>>;
}

/// Yields one channel-day of continuous data at a time.
pub trait SegmentProvider {
    /// The segment for a channel-day, or `None` when no data exists for
    /// that day.
    fn segment(&self, channel: &ChannelId, day: NaiveDate) -> MatchResult<Option<ContinuousSegment>>;
}

const TEMPLATE_MAGIC: &[u8; 4] = b"QMT1";
const TEMPLATE_HEADER_LEN: usize = 4 + 8 + 8 + 8;

/// Reads templates from a directory of `{channel}_{event}_{npts}` files.
pub struct DirTemplateProvider {
    dir: PathBuf,
}

impl DirTemplateProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read(
        &self,
        path: &Path,
        channel: ChannelId,
        event: EventId,
        npts: usize,
    ) -> MatchResult<Template> {
        let bytes = fs::read(path)?;
        let bad = || MatchError::DataQuality {
            reason: format!("unreadable template file {path:?}"),
        };

        if bytes.len() != TEMPLATE_HEADER_LEN + npts * 4 {
            return Err(bad());
        }
        if &bytes[..4] != TEMPLATE_MAGIC {
            return Err(bad());
        }
        let sample_rate = f64::from_le_bytes(field(&bytes, 4).ok_or_else(&bad)?);
        let start_micros = i64::from_le_bytes(field(&bytes, 12).ok_or_else(&bad)?);
        let distance_km = f64::from_le_bytes(field(&bytes, 20).ok_or_else(&bad)?);
        let start_time = DateTime::from_timestamp_micros(start_micros).ok_or_else(&bad)?;

        let samples = bytes[TEMPLATE_HEADER_LEN..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Template::new(samples, sample_rate, start_time, channel, event, distance_km)
    }
}

impl TemplateProvider for DirTemplateProvider {
    fn templates(&self) -> MatchResult<Vec<Template>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let (channel, event, npts) = match matchfile::parse_file_name(name) {
                Ok(parts) => parts,
                Err(_) => {
                    warn!(file = name, "skipping non-template file in template dir");
                    continue;
                }
            };
            out.push(self.read(&entry.path(), channel, event, npts)?);
        }
        out.sort_by_key(|t| (t.channel().clone(), *t.event()));
        Ok(out)
    }

    fn template(
        &self,
        channel: &ChannelId,
        event: &EventId,
        npts: usize,
    ) -> MatchResult<Option<Template>> {
        let path = self.dir.join(matchfile::file_name(channel, event, npts));
        if !path.exists() {
            return Ok(None);
        }
        self.read(&path, channel.clone(), *event, npts).map(Some)
    }
}

fn field<const N: usize>(bytes: &[u8], at: usize) -> Option<[u8; N]> {
    bytes.get(at..at + N)?.try_into().ok()
}

/// Writes a template in the native binary layout; returns the file path.
pub fn write_template(dir: &Path, template: &Template) -> MatchResult<PathBuf> {
    let mut bytes = Vec::with_capacity(TEMPLATE_HEADER_LEN + template.len() * 4);
    bytes.extend_from_slice(TEMPLATE_MAGIC);
    bytes.extend_from_slice(&template.sample_rate().to_le_bytes());
    bytes.extend_from_slice(&template.start_time().timestamp_micros().to_le_bytes());
    bytes.extend_from_slice(&template.distance_km().to_le_bytes());
    for v in template.samples() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let path = dir.join(template.file_name());
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Reads raw little-endian f32 day files laid out by a path pattern.
pub struct DayFileProvider {
    data_path: String,
    structure: String,
    sample_rate: f64,
}

impl DayFileProvider {
    pub fn new(data_path: impl Into<String>, structure: impl Into<String>, sample_rate: f64) -> Self {
        Self {
            data_path: data_path.into(),
            structure: structure.into(),
            sample_rate,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.data_path.clone(),
            config.data_structure.clone(),
            config.sample_rate,
        )
    }

    /// Expands the path pattern for one channel-day.
    pub fn day_path(&self, channel: &ChannelId, day: NaiveDate) -> PathBuf {
        let path = self
            .structure
            .replace("{data_path}", &self.data_path)
            .replace("{net}", channel.network())
            .replace("{sta}", channel.station())
            .replace("{loc}", channel.location())
            .replace("{cha}", channel.channel())
            .replace("{year}", &format!("{:04}", day.year()))
            .replace("{julday}", &format!("{:03}", day.ordinal()));
        PathBuf::from(path)
    }
}

impl SegmentProvider for DayFileProvider {
    fn segment(&self, channel: &ChannelId, day: NaiveDate) -> MatchResult<Option<ContinuousSegment>> {
        let path = self.day_path(channel, day);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.len() % 4 != 0 {
            return Err(MatchError::DataQuality {
                reason: format!("day file {path:?} is not a whole number of f32 samples"),
            });
        }
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let start_time = day
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| MatchError::DataQuality {
                reason: format!("invalid day {day}"),
            })?;
        ContinuousSegment::new(samples, self.sample_rate, start_time, channel.clone(), day).map(Some)
    }
}

/// Writes a raw f32 day file, creating parent directories as needed.
pub fn write_day_file(path: &Path, samples: &[f32]) -> MatchResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for v in samples {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_path_expands_all_placeholders() {
        let provider = DayFileProvider::new(
            "archive",
            "{data_path}/{year}/{net}/{sta}/{cha}.D/{net}.{sta}.{loc}.{cha}.D.{year}.{julday}",
            25.0,
        );
        let channel: ChannelId = "CX.PB01..HHZ".parse().unwrap();
        let day = NaiveDate::from_ymd_opt(2021, 1, 5).unwrap();
        assert_eq!(
            provider.day_path(&channel, day),
            PathBuf::from("archive/2021/CX/PB01/HHZ.D/CX.PB01..HHZ.D.2021.005")
        );
    }
}
