//! Error types for quakematch.

use thiserror::Error;

/// Result alias for quakematch operations.
pub type MatchResult<T> = std::result::Result<T, MatchError>;

/// Errors that can occur while matching templates or building event families.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The configuration is invalid or internally inconsistent. Fatal:
    /// detected before any correlation work starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A unit of work received unusable input data. Reported per
    /// (template, channel-day) unit; the run continues.
    #[error("data quality: {reason}")]
    DataQuality { reason: String },

    /// Template and continuous data disagree on the sampling rate.
    #[error("sample rate mismatch: template {template} Hz vs segment {segment} Hz")]
    SampleRateMismatch { template: f64, segment: f64 },

    /// The requested correlation backend is not compiled into this build.
    #[error("correlation backend `{requested}` is not available in this build")]
    BackendUnavailable { requested: &'static str },

    /// The worker pool could not be constructed.
    #[error("worker pool: {0}")]
    WorkerPool(String),

    /// A channel identity was not of the form `NET.STA.LOC.CHA`.
    #[error("malformed channel id `{0}`")]
    MalformedChannelId(String),

    /// A timestamp string did not match the expected format.
    #[error("malformed timestamp `{0}`")]
    MalformedTimestamp(String),

    /// A line of a match or family file could not be parsed.
    #[error("malformed {what} record: `{line}`")]
    MalformedRecord { what: &'static str, line: String },

    /// A file name did not follow the `{channel}_{event}_{npts}` convention.
    #[error("malformed file name `{0}`")]
    MalformedFileName(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
