//! Core entity structures

use crate::{
    CampaignId, CampaignStatus, Channel, ConsentState, ContactPoint, EmbeddingStatus,
    EmbeddingVector, EventKey, ProfileKey, TemplateId, TenantId, TenantStatus, Timestamp,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tenant - root identity and isolation domain.
/// Every other entity is scoped to exactly one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub status: TenantStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Tenant {
    /// Create a new active tenant.
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: Uuid::now_v7(),
            name: name.to_string(),
            status: TenantStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reference to a segment or journey a profile currently belongs to.
/// Denormalized onto the profile for read speed; the historical truth of
/// membership at decision time lives in snapshots, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentRef {
    pub id: String,
    pub name: String,
}

impl SegmentRef {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Computed topic affinity for a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityScore {
    /// Topic or instrument symbol (e.g. "AAPL").
    pub topic: String,
    /// Accumulated raw engagement score.
    pub raw_score: f64,
    /// Normalized interest in [0.0, 1.0].
    pub interest_score: f64,
    pub last_interaction: Option<Timestamp>,
}

/// Profile - canonical customer record, tenant-scoped.
///
/// Keyed by a tenant-unique external key. Computed fields are re-evaluated
/// in place (full replacement, last-writer-wins); profiles carry no version
/// history - the truth of what a decision saw lives in snapshots and the
/// ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub tenant_id: TenantId,
    pub profile_key: ProfileKey,

    // Contact
    pub primary_email: Option<ContactPoint>,
    pub secondary_emails: Vec<ContactPoint>,
    pub primary_phone: Option<ContactPoint>,
    pub secondary_phones: Vec<ContactPoint>,

    // Personal & location
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_titles: Vec<String>,
    pub living_city: Option<String>,
    pub living_country: Option<String>,

    // Enrichment
    pub data_labels: Vec<String>,
    pub content_keywords: Vec<String>,
    pub media_channels: Vec<Channel>,
    /// Semantic behavioral labels (summary, not the raw event log).
    pub behavioral_events: Vec<String>,
    /// Per-label event counts (e.g. "CLICK" -> 42).
    pub event_statistics: BTreeMap<String, i64>,
    pub affinities: Vec<AffinityScore>,

    // Segmentation & journeys (denormalized)
    pub segments: Vec<SegmentRef>,
    pub journey_maps: Vec<SegmentRef>,

    // Consent, per channel. Absent means Unknown, which is deny.
    pub consents: BTreeMap<Channel, ConsentState>,

    // Embedding
    pub embedding: Option<EmbeddingVector>,
    pub embedding_status: EmbeddingStatus,

    // Extensibility
    pub ext: Option<serde_json::Value>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Profile {
    /// Create a minimal profile under a tenant.
    pub fn new(tenant_id: TenantId, profile_key: &str) -> Self {
        let now = Utc::now();
        Self {
            tenant_id,
            profile_key: profile_key.to_string(),
            primary_email: None,
            secondary_emails: Vec::new(),
            primary_phone: None,
            secondary_phones: Vec::new(),
            first_name: None,
            last_name: None,
            job_titles: Vec::new(),
            living_city: None,
            living_country: None,
            data_labels: Vec::new(),
            content_keywords: Vec::new(),
            media_channels: Vec::new(),
            behavioral_events: Vec::new(),
            event_statistics: BTreeMap::new(),
            affinities: Vec::new(),
            segments: Vec::new(),
            journey_maps: Vec::new(),
            consents: BTreeMap::new(),
            embedding: None,
            embedding_status: EmbeddingStatus::Pending,
            ext: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the primary email.
    pub fn with_email(mut self, email: ContactPoint) -> Self {
        self.primary_email = Some(email);
        self
    }

    /// Set the primary phone.
    pub fn with_phone(mut self, phone: ContactPoint) -> Self {
        self.primary_phone = Some(phone);
        self
    }

    /// Set the name.
    pub fn with_name(mut self, first: &str, last: &str) -> Self {
        self.first_name = Some(first.to_string());
        self.last_name = Some(last.to_string());
        self
    }

    /// Add data labels.
    pub fn with_data_labels(mut self, labels: Vec<String>) -> Self {
        self.data_labels = labels;
        self
    }

    /// Add reachable media channels.
    pub fn with_media_channels(mut self, channels: Vec<Channel>) -> Self {
        self.media_channels = channels;
        self
    }

    /// Add segment memberships.
    pub fn with_segments(mut self, segments: Vec<SegmentRef>) -> Self {
        self.segments = segments;
        self
    }

    /// Record explicit consent for a channel.
    pub fn grant_consent(&mut self, channel: Channel) {
        self.consents.insert(channel, ConsentState::Granted);
        self.updated_at = Utc::now();
    }

    /// Revoke consent for a channel.
    pub fn revoke_consent(&mut self, channel: Channel) {
        self.consents.insert(channel, ConsentState::Revoked);
        self.updated_at = Utc::now();
    }

    /// Consent state for a channel; absent entries are Unknown.
    pub fn consent_for(&self, channel: Channel) -> ConsentState {
        self.consents.get(&channel).copied().unwrap_or_default()
    }

    /// The contact point a delivery on this channel would address, if any.
    pub fn contact_for(&self, channel: Channel) -> Option<&ContactPoint> {
        match channel {
            Channel::Email => self.primary_email.as_ref(),
            Channel::ZaloOa => self.primary_phone.as_ref(),
            // Push/page channels address the profile by platform identity.
            _ => None,
        }
    }

    /// Whether the profile is in a segment with the given id.
    pub fn in_segment(&self, segment_id: &str) -> bool {
        self.segments.iter().any(|s| s.id == segment_id)
    }

    /// Normalized interest score for a topic, if tracked.
    pub fn affinity_for(&self, topic: &str) -> Option<f64> {
        self.affinities
            .iter()
            .find(|a| a.topic == topic)
            .map(|a| a.interest_score)
    }
}

/// Campaign - tenant-scoped container grouping marketing events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    pub objective: Option<String>,
    pub status: CampaignStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Campaign {
    /// Create a draft campaign.
    pub fn new(tenant_id: TenantId, name: &str) -> Self {
        let now = Utc::now();
        Self {
            campaign_id: Uuid::now_v7(),
            tenant_id,
            name: name.to_string(),
            objective: None,
            status: CampaignStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the objective.
    pub fn with_objective(mut self, objective: &str) -> Self {
        self.objective = Some(objective.to_string());
        self
    }
}

/// MarketingEvent - the definitional entity: a reusable, content-addressed
/// description of a possible action.
///
/// Identity (`event_key`) is computed once at creation over the canonical
/// defining tuple and is never recomputed; edits to content fields do not
/// change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingEvent {
    pub event_key: EventKey,
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub name: String,
    /// Free-form type tag (e.g. "promo", "reminder").
    pub event_type: String,
    pub channel: Channel,
    pub description: Option<String>,
    /// The message body sent on activation.
    pub message: String,
    pub embedding: Option<EmbeddingVector>,
    pub embedding_status: EmbeddingStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MarketingEvent {
    /// Create a new marketing event; derives the content-addressed key.
    pub fn new(
        tenant_id: TenantId,
        campaign_id: CampaignId,
        name: &str,
        event_type: &str,
        channel: Channel,
        message: &str,
    ) -> Self {
        let now = Utc::now();
        let event_key = EventKey::derive(
            name,
            event_type,
            channel.as_db_str(),
            campaign_id,
            tenant_id,
            now,
        );
        Self {
            event_key,
            tenant_id,
            campaign_id,
            name: name.to_string(),
            event_type: event_type.to_string(),
            channel,
            description: None,
            message: message.to_string(),
            embedding: None,
            embedding_status: EmbeddingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// The text an enrichment worker embeds for this event.
    pub fn embeddable_content(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(desc) = &self.description {
            parts.push(desc);
        }
        parts.push(&self.message);
        parts.join("\n")
    }
}

/// MessageTemplate - reusable render source for a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub template_id: TemplateId,
    pub tenant_id: TenantId,
    pub name: String,
    pub channel: Channel,
    pub subject: Option<String>,
    pub body: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MessageTemplate {
    pub fn new(tenant_id: TenantId, name: &str, channel: Channel, body: &str) -> Self {
        let now = Utc::now();
        Self {
            template_id: Uuid::now_v7(),
            tenant_id,
            name: name.to_string(),
            channel,
            subject: None,
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the subject line.
    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_starts_active() {
        let tenant = Tenant::new("acme");
        assert_eq!(tenant.status, TenantStatus::Active);
        assert_eq!(tenant.tenant_id.get_version_num(), 7);
    }

    #[test]
    fn test_profile_consent_defaults_deny() {
        let profile = Profile::new(Uuid::now_v7(), "p_01");
        assert_eq!(profile.consent_for(Channel::Email), ConsentState::Unknown);
    }

    #[test]
    fn test_profile_consent_grant_and_revoke() {
        let mut profile = Profile::new(Uuid::now_v7(), "p_01");
        profile.grant_consent(Channel::Email);
        assert_eq!(profile.consent_for(Channel::Email), ConsentState::Granted);
        profile.revoke_consent(Channel::Email);
        assert_eq!(profile.consent_for(Channel::Email), ConsentState::Revoked);
        // Other channels remain unknown
        assert_eq!(profile.consent_for(Channel::WebPush), ConsentState::Unknown);
    }

    #[test]
    fn test_profile_contact_for_channel() {
        let profile = Profile::new(Uuid::now_v7(), "p_01")
            .with_email(ContactPoint::email("a@example.com").unwrap())
            .with_phone(ContactPoint::phone("+84901234567").unwrap());
        assert!(profile.contact_for(Channel::Email).is_some());
        assert!(profile.contact_for(Channel::ZaloOa).is_some());
        assert!(profile.contact_for(Channel::WebPush).is_none());
    }

    #[test]
    fn test_profile_affinity_lookup() {
        let mut profile = Profile::new(Uuid::now_v7(), "p_01");
        profile.affinities.push(AffinityScore {
            topic: "AAPL".to_string(),
            raw_score: 500.0,
            interest_score: 0.83,
            last_interaction: None,
        });
        assert_eq!(profile.affinity_for("AAPL"), Some(0.83));
        assert_eq!(profile.affinity_for("TSLA"), None);
    }

    #[test]
    fn test_marketing_event_key_survives_content_edit() {
        let tenant = Uuid::now_v7();
        let campaign = Uuid::now_v7();
        let mut event = MarketingEvent::new(
            tenant,
            campaign,
            "Spring Sale",
            "promo",
            Channel::Email,
            "20% off this week",
        );
        let key = event.event_key;
        event.message = "30% off this week".to_string();
        event.updated_at = Utc::now();
        assert_eq!(event.event_key, key);
    }

    #[test]
    fn test_marketing_event_embeddable_content() {
        let event = MarketingEvent::new(
            Uuid::now_v7(),
            Uuid::now_v7(),
            "Spring Sale",
            "promo",
            Channel::Email,
            "20% off",
        )
        .with_description("seasonal promotion");
        let content = event.embeddable_content();
        assert!(content.contains("Spring Sale"));
        assert!(content.contains("seasonal promotion"));
        assert!(content.contains("20% off"));
    }

    #[test]
    fn test_profile_serde_roundtrip() {
        let mut profile = Profile::new(Uuid::now_v7(), "p_01")
            .with_email(ContactPoint::email("a@example.com").unwrap())
            .with_data_labels(vec!["VIP".to_string()])
            .with_media_channels(vec![Channel::Email, Channel::WebPush]);
        profile.grant_consent(Channel::Email);
        profile.event_statistics.insert("CLICK".to_string(), 42);

        let json = serde_json::to_string(&profile).unwrap();
        let back: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, back);
    }
}
