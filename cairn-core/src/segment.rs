//! Segment definitions and snapshot types

use crate::{Channel, Profile, ProfileKey, SegmentRef, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single profile predicate inside a segment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentRule {
    /// Profile carries the data label (e.g. "VIP", "WHALE").
    DataLabel(String),
    /// Exact match on living city.
    LivingCity(String),
    /// Profile is interested in the content keyword.
    ContentKeyword(String),
    /// Profile is reachable on the channel.
    MediaChannel(Channel),
    /// Profile holds the job title.
    JobTitle(String),
    /// Profile carries the semantic behavioral label.
    BehavioralEvent(String),
    /// Profile is a current member of the segment id.
    InSegment(String),
    /// Topic affinity at or above a minimum normalized score.
    MinAffinity { topic: String, min_score: f64 },
    /// Profile has a usable contact point for the channel.
    HasContactFor(Channel),
}

impl SegmentRule {
    /// Evaluate this rule against a profile's current state.
    pub fn matches(&self, profile: &Profile) -> bool {
        match self {
            SegmentRule::DataLabel(label) => profile.data_labels.iter().any(|l| l == label),
            SegmentRule::LivingCity(city) => profile.living_city.as_deref() == Some(city.as_str()),
            SegmentRule::ContentKeyword(kw) => profile.content_keywords.iter().any(|k| k == kw),
            SegmentRule::MediaChannel(channel) => profile.media_channels.contains(channel),
            SegmentRule::JobTitle(title) => profile.job_titles.iter().any(|t| t == title),
            SegmentRule::BehavioralEvent(label) => {
                profile.behavioral_events.iter().any(|l| l == label)
            }
            SegmentRule::InSegment(segment_id) => profile.in_segment(segment_id),
            SegmentRule::MinAffinity { topic, min_score } => profile
                .affinity_for(topic)
                .map(|score| score >= *min_score)
                .unwrap_or(false),
            SegmentRule::HasContactFor(channel) => profile.contact_for(*channel).is_some(),
        }
    }
}

/// A versioned membership query over current profile state.
/// All rules must match (conjunction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDefinition {
    pub segment: SegmentRef,
    pub version: u32,
    pub rules: Vec<SegmentRule>,
}

impl SegmentDefinition {
    pub fn new(segment: SegmentRef, version: u32, rules: Vec<SegmentRule>) -> Self {
        Self {
            segment,
            version,
            rules,
        }
    }

    /// Whether the profile is a member under this definition.
    pub fn matches(&self, profile: &Profile) -> bool {
        self.rules.iter().all(|rule| rule.matches(profile))
    }
}

/// Immutable header of a frozen membership set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    /// Caller-supplied snapshot identifier.
    pub snapshot_id: String,
    pub tenant_id: TenantId,
    pub segment: SegmentRef,
    pub version: u32,
    pub member_count: usize,
    pub created_at: Timestamp,
}

/// Handle returned by snapshot creation; safe to pass to the decision agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHandle {
    pub snapshot_id: String,
    pub tenant_id: TenantId,
    pub member_count: usize,
}

/// A frozen membership set: header plus members, written all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub header: SegmentSnapshot,
    pub members: BTreeSet<ProfileKey>,
}

impl SnapshotRecord {
    /// The externally-visible handle for this snapshot.
    pub fn handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            snapshot_id: self.header.snapshot_id.clone(),
            tenant_id: self.header.tenant_id,
            member_count: self.header.member_count,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
