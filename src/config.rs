//! Run configuration.
//!
//! Configuration is loaded from a `config.yaml`, validated as a whole
//! before any correlation work starts, and frozen into an immutable
//! `Config` that workers share by reference. Validation collects every
//! problem and reports them together.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::detect::Thresholds;
use crate::family::Criteria;
use crate::kernel::Backend;
use crate::util::{MatchError, MatchResult};

/// Immutable, validated run configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of parallel workers.
    pub n_workers: usize,
    /// Requested correlation backend.
    pub backend: Backend,
    /// Permit falling back to the scalar kernel when the requested backend
    /// is unavailable in this build.
    pub allow_backend_fallback: bool,
    /// First day of continuous data to correlate.
    pub data_start: NaiveDate,
    /// Last day of continuous data to correlate (inclusive).
    pub data_stop: NaiveDate,
    /// Detection thresholds.
    pub thresholds: Thresholds,
    /// Sampling rate of the continuous day files, in Hz.
    pub sample_rate: f64,
    /// Root folder of the continuous data archive.
    pub data_path: String,
    /// Day-file path pattern under `data_path`; see `provider`.
    pub data_structure: String,
    /// Folder holding template waveform files.
    pub template_dir: PathBuf,
    /// Folder receiving per-template match files.
    pub matches_dir: PathBuf,
    /// Folder receiving per-event family files.
    pub family_dir: PathBuf,
    /// Event-definition criteria for family association.
    pub criteria: Criteria,
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> MatchResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            MatchError::Config(format!("cannot read configuration file {path:?}: {e}"))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parses and validates configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> MatchResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(text)
            .map_err(|e| MatchError::Config(format!("cannot parse configuration: {e}")))?;
        file.validate()
    }

    /// Writes a commented example configuration and validates it. Refuses
    /// to overwrite an existing file.
    pub fn write_example(path: &Path) -> MatchResult<()> {
        if path.exists() {
            return Err(MatchError::Config(format!(
                "{path:?} already exists; rename or delete it first"
            )));
        }
        fs::write(path, EXAMPLE_CONFIG)?;
        Self::load(path)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    performance: PerformanceSection,
    cross_correlation: CrossCorrelationSection,
    #[serde(default)]
    data: DataSection,
    #[serde(default)]
    directories: DirectoriesSection,
    selection: SelectionSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PerformanceSection {
    #[serde(default = "default_workers")]
    n_workers: usize,
    #[serde(default)]
    backend: BackendName,
    #[serde(default = "default_true")]
    allow_backend_fallback: bool,
}

impl Default for PerformanceSection {
    fn default() -> Self {
        Self {
            n_workers: default_workers(),
            backend: BackendName::default(),
            allow_backend_fallback: true,
        }
    }
}

#[derive(Debug, Default, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum BackendName {
    #[default]
    Scalar,
    Simd,
}

impl From<BackendName> for Backend {
    fn from(value: BackendName) -> Self {
        match value {
            BackendName::Scalar => Backend::Scalar,
            BackendName::Simd => Backend::Simd,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CrossCorrelationSection {
    data_start: NaiveDate,
    data_stop: NaiveDate,
    cc_threshold: f32,
    mad_threshold: f32,
    #[serde(default = "default_true")]
    combine_thresholds: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DataSection {
    #[serde(default = "default_sample_rate")]
    sample_rate: f64,
    #[serde(default = "default_data_path")]
    data_path: String,
    #[serde(default = "default_data_structure")]
    data_structure: String,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            data_path: default_data_path(),
            data_structure: default_data_structure(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectoriesSection {
    #[serde(default = "default_template_dir")]
    template_dir: PathBuf,
    #[serde(default = "default_matches_dir")]
    matches_dir: PathBuf,
    #[serde(default = "default_family_dir")]
    family_dir: PathBuf,
}

impl Default for DirectoriesSection {
    fn default() -> Self {
        Self {
            template_dir: default_template_dir(),
            matches_dir: default_matches_dir(),
            family_dir: default_family_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectionSection {
    cc_criteria: Vec<f32>,
    mad_criteria: Vec<f32>,
    max_t_diff: f64,
    #[serde(default = "default_true")]
    combine_criteria: bool,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> f64 {
    25.0
}

fn default_data_path() -> String {
    String::from("data")
}

fn default_data_structure() -> String {
    String::from("{data_path}/{year}/{net}/{sta}/{cha}.D/{net}.{sta}.{loc}.{cha}.D.{year}.{julday}")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_matches_dir() -> PathBuf {
    PathBuf::from("matches")
}

fn default_family_dir() -> PathBuf {
    PathBuf::from("event_families")
}

impl ConfigFile {
    fn validate(self) -> MatchResult<Config> {
        let mut errors: Vec<String> = Vec::new();

        if self.performance.n_workers == 0 {
            errors.push("n_workers must be at least 1".to_string());
        }

        let cc = &self.cross_correlation;
        if !(0.0..=1.0).contains(&cc.cc_threshold) {
            errors.push(format!(
                "cc_threshold should be in range [0, 1], got {}",
                cc.cc_threshold
            ));
        }
        if !cc.mad_threshold.is_finite() || cc.mad_threshold < 0.0 {
            errors.push(format!(
                "mad_threshold should be non-negative, got {}",
                cc.mad_threshold
            ));
        }
        if cc.data_start > cc.data_stop {
            errors.push("data_start cannot be after data_stop".to_string());
        }

        if !(self.data.sample_rate > 0.0) {
            errors.push(format!(
                "sample_rate should be positive, got {}",
                self.data.sample_rate
            ));
        }

        let sel = &self.selection;
        for value in &sel.cc_criteria {
            if !(0.0..=1.0).contains(value) {
                errors.push(format!(
                    "cc_criteria values should be in range [0, 1], got {value}"
                ));
                break;
            }
        }
        for value in &sel.mad_criteria {
            if !value.is_finite() || *value < 0.0 {
                errors.push(format!(
                    "mad_criteria values should be non-negative, got {value}"
                ));
                break;
            }
        }
        // a criterion below the initial threshold could never be observed
        if let Some(min) = min_of(&sel.cc_criteria) {
            if min < cc.cc_threshold {
                errors.push(
                    "cc_criteria values cannot be below the initial threshold cc_threshold"
                        .to_string(),
                );
            }
        }
        if let Some(min) = min_of(&sel.mad_criteria) {
            if min < cc.mad_threshold {
                errors.push(
                    "mad_criteria values cannot be below the initial threshold mad_threshold"
                        .to_string(),
                );
            }
        }
        if !sel.max_t_diff.is_finite() || sel.max_t_diff < 0.0 {
            errors.push(format!(
                "max_t_diff should be non-negative, got {}",
                sel.max_t_diff
            ));
        }

        if !errors.is_empty() {
            return Err(MatchError::Config(format!(
                "the configuration contains {} error(s):\n{}",
                errors.len(),
                errors.join("\n")
            )));
        }

        let mut cc_criteria = sel.cc_criteria.clone();
        let mut mad_criteria = sel.mad_criteria.clone();
        cc_criteria.sort_by(|a, b| b.total_cmp(a));
        mad_criteria.sort_by(|a, b| b.total_cmp(a));

        let config = Config {
            n_workers: self.performance.n_workers,
            backend: self.performance.backend.into(),
            allow_backend_fallback: self.performance.allow_backend_fallback,
            data_start: cc.data_start,
            data_stop: cc.data_stop,
            thresholds: Thresholds {
                cc_threshold: cc.cc_threshold,
                mad_threshold: cc.mad_threshold,
                combine_thresholds: cc.combine_thresholds,
            },
            sample_rate: self.data.sample_rate,
            data_path: self.data.data_path,
            data_structure: self.data.data_structure,
            template_dir: self.directories.template_dir,
            matches_dir: self.directories.matches_dir,
            family_dir: self.directories.family_dir,
            criteria: Criteria {
                cc_criteria,
                mad_criteria,
                max_t_diff: sel.max_t_diff,
                combine_criteria: sel.combine_criteria,
            },
        };
        config.criteria.validate()?;
        Ok(config)
    }
}

fn min_of(values: &[f32]) -> Option<f32> {
    values.iter().copied().reduce(f32::min)
}

/// Commented starting-point configuration written by `write_example`.
const EXAMPLE_CONFIG: &str = "\
#   config.yaml
#
#   Starting-point configuration for a quakematch project. Adjust the
#   values below, then run `quakematch match` followed by
#   `quakematch families`.

# performance settings
performance:
    # maximum number of parallel workers
    n_workers: 4
    # correlation backend: scalar or simd
    backend: scalar
    # fall back to the scalar kernel if the backend is unavailable
    allow_backend_fallback: true

# cross-correlation settings
cross_correlation:
    # first and last day (inclusive) of continuous data to scan
    data_start: 2021-01-05
    data_stop: 2021-01-05
    # threshold on the absolute normalized cross-correlation value
    cc_threshold: 0.7
    # threshold as a multiple of the daily median absolute deviation
    mad_threshold: 8
    # true: both thresholds must pass; false: either suffices
    combine_thresholds: true

# continuous data layout
data:
    # sampling rate of the day files in Hz
    sample_rate: 25.0
    # root folder of the continuous data
    data_path: data
    # day-file pattern; placeholders: {data_path} {net} {sta} {loc} {cha}
    # {year} {julday}
    data_structure: \"{data_path}/{year}/{net}/{sta}/{cha}.D/{net}.{sta}.{loc}.{cha}.D.{year}.{julday}\"

# folders and file structure
directories:
    # template waveforms, named {channel}_{event}_{npts}
    template_dir: templates
    # match files, one per template, same name as the template
    matches_dir: matches
    # event families, one file per template event
    family_dir: event_families

# event selection criteria
selection:
    # per-rank minima on |cc| for simultaneous detections; [0.7, 0.7]
    # requires two stations at 0.7. Empty list disables.
    cc_criteria: [0.7, 0.7]
    # per-rank minima on |cc| / MAD; empty list disables
    mad_criteria: []
    # simultaneity window on estimated origin times, in seconds
    max_t_diff: 10.0
    # true: both criteria must be met; false: either suffices
    combine_criteria: true
";
