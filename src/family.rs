//! Event-family association across channels.
//!
//! Detections made by the same template event on different stations carry
//! different travel-time offsets. The family builder removes each channel's
//! offset, merges all channels into one time-sorted stream, clusters
//! near-simultaneous detections, and keeps the clusters that satisfy the
//! event-definition criteria.

use chrono::{DateTime, Duration, Utc};

use crate::detect::DetectionRecord;
use crate::util::{MatchError, MatchResult};
use crate::waveform::{ChannelId, EventId};

/// Event-definition criteria.
///
/// `cc_criteria` and `mad_criteria` are per-rank minima applied to the
/// cluster's values sorted in descending magnitude: `[0.7, 0.5]` requires
/// the two strongest detections to reach 0.7 and 0.5 respectively, which
/// implies at least two cluster members. An empty list is disabled and
/// takes no part in the AND/OR combination.
#[derive(Clone, Debug)]
pub struct Criteria {
    /// Per-rank minima on |cc|, descending.
    pub cc_criteria: Vec<f32>,
    /// Per-rank minima on |cc / MAD|, descending.
    pub mad_criteria: Vec<f32>,
    /// Simultaneity window on estimated origin times, in seconds.
    pub max_t_diff: f64,
    /// If true both criteria lists must be satisfied; otherwise either.
    pub combine_criteria: bool,
}

impl Criteria {
    /// Rejects inconsistent criteria before any processing starts.
    pub fn validate(&self) -> MatchResult<()> {
        if !self.max_t_diff.is_finite() || self.max_t_diff < 0.0 {
            return Err(MatchError::Config(format!(
                "max_t_diff must be non-negative, got {}",
                self.max_t_diff
            )));
        }
        for (name, list) in [("cc_criteria", &self.cc_criteria), ("mad_criteria", &self.mad_criteria)] {
            if list.iter().any(|v| !v.is_finite()) {
                return Err(MatchError::Config(format!(
                    "{name} contains a non-finite value"
                )));
            }
        }
        Ok(())
    }
}

/// All detections of one template on one channel, time-ordered, together
/// with that channel's template-to-origin offset in seconds.
pub struct ChannelMatches {
    pub channel: ChannelId,
    pub origin_offset: f64,
    pub records: Vec<DetectionRecord>,
}

/// One qualifying cluster: a multi-station detection of the template event.
///
/// The four per-channel lists are index-aligned and ordered by arrival in
/// the merged stream (not by rank).
#[derive(Clone, Debug)]
pub struct FamilyDetection {
    /// Estimated origin time of the cluster anchor (its earliest member).
    pub origin_time: DateTime<Utc>,
    pub channels: Vec<ChannelId>,
    pub cc: Vec<f32>,
    pub cc_over_mad: Vec<f32>,
    pub amplitude_ratio: Vec<f32>,
}

impl FamilyDetection {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// All qualifying detections of one template event, in increasing time
/// order. A template event with no qualifying clusters has an empty list.
pub struct EventFamily {
    event: EventId,
    detections: Vec<FamilyDetection>,
}

impl EventFamily {
    pub fn event(&self) -> &EventId {
        &self.event
    }

    pub fn detections(&self) -> &[FamilyDetection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

struct Tagged {
    est: DateTime<Utc>,
    set_idx: usize,
    cc: f32,
    cc_over_mad: f32,
    amplitude_ratio: f32,
}

/// Builds the event family for one template event from its per-channel
/// match sets.
///
/// Missing or empty match sets simply contribute no detections. The
/// clustering sweep is single-pass with a fixed anchor: a cluster's window
/// is anchored at its first member and does not re-center as members join.
pub fn associate(event: EventId, sets: &[ChannelMatches], criteria: &Criteria) -> EventFamily {
    let mut stream: Vec<Tagged> = Vec::new();
    for (set_idx, set) in sets.iter().enumerate() {
        let offset = Duration::microseconds((set.origin_offset * 1e6).round() as i64);
        for record in &set.records {
            stream.push(Tagged {
                est: record.time - offset,
                set_idx,
                cc: record.cc,
                cc_over_mad: record.cc_over_mad,
                amplitude_ratio: record.amplitude_ratio,
            });
        }
    }
    // stable: equal estimated origin times keep per-set insertion order
    stream.sort_by_key(|t| t.est);

    let window = Duration::microseconds((criteria.max_t_diff * 1e6).round() as i64);
    let mut detections = Vec::new();
    let mut anchor = 0usize;
    for i in 0..=stream.len() {
        let open = i < stream.len() && stream[i].est - stream[anchor].est <= window;
        if open {
            continue;
        }
        if let Some(detection) = emit(&stream[anchor..i], sets, criteria) {
            detections.push(detection);
        }
        anchor = i;
    }

    EventFamily { event, detections }
}

fn emit(
    cluster: &[Tagged],
    sets: &[ChannelMatches],
    criteria: &Criteria,
) -> Option<FamilyDetection> {
    if cluster.is_empty() || !qualifies(cluster, criteria) {
        return None;
    }
    Some(FamilyDetection {
        origin_time: cluster[0].est,
        channels: cluster
            .iter()
            .map(|t| sets[t.set_idx].channel.clone())
            .collect(),
        cc: cluster.iter().map(|t| t.cc).collect(),
        cc_over_mad: cluster.iter().map(|t| t.cc_over_mad).collect(),
        amplitude_ratio: cluster.iter().map(|t| t.amplitude_ratio).collect(),
    })
}

/// An empty criteria list is disabled: it takes no part in the AND/OR
/// combination, so a lone enabled list decides the verdict on its own.
fn qualifies(cluster: &[Tagged], criteria: &Criteria) -> bool {
    let cc_verdict = || {
        meets_ranked(
            cluster.iter().map(|t| t.cc.abs()).collect(),
            &criteria.cc_criteria,
        )
    };
    let mad_verdict = || {
        meets_ranked(
            cluster.iter().map(|t| t.cc_over_mad.abs()).collect(),
            &criteria.mad_criteria,
        )
    };
    match (
        criteria.cc_criteria.is_empty(),
        criteria.mad_criteria.is_empty(),
    ) {
        (true, true) => true,
        (false, true) => cc_verdict(),
        (true, false) => mad_verdict(),
        (false, false) => {
            if criteria.combine_criteria {
                cc_verdict() && mad_verdict()
            } else {
                cc_verdict() || mad_verdict()
            }
        }
    }
}

/// Checks per-rank minima against values sorted in descending order. A
/// criteria list longer than the cluster cannot be satisfied.
fn meets_ranked(mut values: Vec<f32>, minima: &[f32]) -> bool {
    if minima.is_empty() {
        return true;
    }
    if values.len() < minima.len() {
        return false;
    }
    values.sort_by(|a, b| b.total_cmp(a));
    minima.iter().zip(&values).all(|(min, v)| v >= min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_minima_respect_rank_and_length() {
        assert!(meets_ranked(vec![0.72, 0.55, 0.40], &[0.7, 0.5]));
        assert!(!meets_ranked(vec![0.72, 0.55, 0.40], &[0.8, 0.5]));
        assert!(!meets_ranked(vec![0.72], &[0.7, 0.5]));
        assert!(meets_ranked(vec![], &[]));
    }

    #[test]
    fn criteria_validation_rejects_negative_window() {
        let criteria = Criteria {
            cc_criteria: vec![],
            mad_criteria: vec![],
            max_t_diff: -1.0,
            combine_criteria: false,
        };
        assert!(criteria.validate().is_err());
    }
}
