//! QuakeMatch is a template-matching earthquake detector.
//!
//! Short reference waveforms ("templates") extracted around known events
//! are slid over continuous channel-day recordings; normalized
//! cross-correlation peaks passing absolute and MAD-relative thresholds
//! become detections, and detections from multiple stations are aligned on
//! estimated origin time and merged into per-template-event families.
//!
//! The correlation scan runs on a scalar kernel or, with the `simd`
//! feature, a vectorized one; the `rayon` feature distributes independent
//! (template, channel-day) units over a bounded worker pool.

pub mod config;
pub mod corr;
pub mod detect;
pub mod family;
pub mod kernel;
pub mod matchfile;
pub mod pipeline;
pub mod provider;
pub mod stats;
pub mod timefmt;
pub mod util;
pub mod waveform;

pub use config::Config;
pub use corr::{correlate, CorrelationSeries, TemplatePlan};
pub use detect::{scan_detections, DetectionRecord, Thresholds};
pub use family::{associate, ChannelMatches, Criteria, EventFamily, FamilyDetection};
pub use kernel::{Backend, Kernel};
pub use pipeline::{run_families, run_matching, FamilySummary, RunSummary, UnitFailure};
pub use provider::{
    DayFileProvider, DirTemplateProvider, SegmentProvider, TemplateProvider,
};
pub use stats::DailyStats;
pub use util::{MatchError, MatchResult};
pub use waveform::{ChannelId, ContinuousSegment, EventId, Template};
