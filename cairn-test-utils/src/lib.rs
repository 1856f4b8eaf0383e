//! CAIRN Test Utils - fixtures and generators
//!
//! Shared builders for entities used across unit and integration tests,
//! plus one-shot tracing initialization for test binaries.

use cairn_core::{
    AffinityScore, Channel, ContactPoint, MarketingEvent, Profile, SegmentDefinition, SegmentRef,
    SegmentRule, TenantId,
};
use once_cell::sync::OnceCell;
use proptest::prelude::*;
use uuid::Uuid;

static TRACING: OnceCell<()> = OnceCell::new();

/// Install a tracing subscriber once per test binary. Controlled by
/// `RUST_LOG`; defaults to warn so test output stays quiet.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A profile with the fields most fixtures need: a valid email, a VIP
/// label, email reachability, and a granted email consent.
pub fn vip_profile(tenant_id: TenantId, profile_key: &str) -> Profile {
    let mut profile = Profile::new(tenant_id, profile_key)
        .with_email(ContactPoint::email(&format!("{}@example.com", profile_key)).unwrap())
        .with_name("An", "Nguyen")
        .with_data_labels(vec!["VIP".to_string()])
        .with_media_channels(vec![Channel::Email]);
    profile.living_city = Some("Saigon".to_string());
    profile.grant_consent(Channel::Email);
    profile
}

/// A minimal profile with no contact points or labels.
pub fn bare_profile(tenant_id: TenantId, profile_key: &str) -> Profile {
    Profile::new(tenant_id, profile_key)
}

/// A profile with a topic affinity, for affinity-rule fixtures.
pub fn affinity_profile(
    tenant_id: TenantId,
    profile_key: &str,
    topic: &str,
    interest_score: f64,
) -> Profile {
    let mut profile = vip_profile(tenant_id, profile_key);
    profile.affinities.push(AffinityScore {
        topic: topic.to_string(),
        raw_score: interest_score * 600.0,
        interest_score,
        last_interaction: Some(chrono::Utc::now()),
    });
    profile
}

/// The standard VIP segment definition used across tests.
pub fn vip_segment() -> SegmentDefinition {
    SegmentDefinition::new(
        SegmentRef::new("seg_vip", "VIP customers"),
        1,
        vec![
            SegmentRule::DataLabel("VIP".to_string()),
            SegmentRule::HasContactFor(Channel::Email),
        ],
    )
}

/// An email marketing event under the given campaign.
pub fn spring_sale_event(tenant_id: TenantId, campaign_id: Uuid) -> MarketingEvent {
    MarketingEvent::new(
        tenant_id,
        campaign_id,
        "Spring Sale",
        "promo",
        Channel::Email,
        "20% off this week",
    )
    .with_description("seasonal promotion for engaged customers")
}

// ============================================================================
// PROPTEST STRATEGIES
// ============================================================================

/// Strategy producing arbitrary UUIDs.
pub fn uuid_strategy() -> impl Strategy<Value = Uuid> {
    any::<[u8; 16]>().prop_map(Uuid::from_bytes)
}

/// Strategy producing one of the registered channels.
pub fn channel_strategy() -> impl Strategy<Value = Channel> {
    prop_oneof![
        Just(Channel::Email),
        Just(Channel::ZaloOa),
        Just(Channel::MobilePush),
        Just(Channel::WebPush),
        Just(Channel::FacebookPage),
    ]
}

/// Strategy producing plausible profile keys.
pub fn profile_key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{4,16}".prop_map(|s| format!("p_{}", s))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::ConsentState;

    #[test]
    fn test_vip_profile_matches_vip_segment() {
        let profile = vip_profile(Uuid::now_v7(), "p_01");
        assert!(vip_segment().matches(&profile));
        assert_eq!(profile.consent_for(Channel::Email), ConsentState::Granted);
    }

    #[test]
    fn test_bare_profile_does_not_match() {
        let profile = bare_profile(Uuid::now_v7(), "p_01");
        assert!(!vip_segment().matches(&profile));
    }

    #[test]
    fn test_affinity_profile_scores() {
        let profile = affinity_profile(Uuid::now_v7(), "p_01", "AAPL", 0.83);
        assert_eq!(profile.affinity_for("AAPL"), Some(0.83));
    }

    #[test]
    fn test_init_tracing_is_reentrant() {
        init_tracing();
        init_tracing();
    }
}
