//! Status enums and the activation channel registry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenantStatus {
    Active,
    Suspended,
    Archived,
}

/// Discriminator for entity kinds, used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Tenant,
    Profile,
    Campaign,
    MarketingEvent,
    MessageTemplate,
    BehavioralEvent,
    DeliveryAttempt,
    Outcome,
    Snapshot,
    DecisionRecord,
    EmbedJob,
}

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignStatus {
    Draft,
    Running,
    Paused,
    Completed,
}

/// Per-channel consent state on a profile.
///
/// `Unknown` is treated as deny: consent must be explicitly granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConsentState {
    Granted,
    Revoked,
    #[default]
    Unknown,
}

/// Embedding lifecycle of a definitional entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EmbeddingStatus {
    #[default]
    Pending,
    Ready,
    Failed,
}

/// Status of a delivery attempt in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Kind of attributed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Open,
    Click,
    Conversion,
    OptOut,
}

/// Status of a decision record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionStatus {
    Pending,
    Completed,
    Failed,
}

/// Status of an enrichment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

// ============================================================================
// ACTIVATION CHANNELS
// ============================================================================

/// An activation channel a profile can be reached on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    Email,
    ZaloOa,
    MobilePush,
    WebPush,
    FacebookPage,
}

impl Channel {
    /// All channels, in registry order.
    pub const ALL: [Channel; 5] = [
        Channel::Email,
        Channel::ZaloOa,
        Channel::MobilePush,
        Channel::WebPush,
        Channel::FacebookPage,
    ];

    /// Canonical storage string.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::ZaloOa => "zalo_oa",
            Channel::MobilePush => "mobile_push",
            Channel::WebPush => "web_push",
            Channel::FacebookPage => "facebook_page",
        }
    }

    /// Parse a channel name, accepting the common alias and variant forms
    /// upstream systems send ("Zalo OA", "zalo-push", "fb_page", "web
    /// notification", ...). Input is lowercased and space/hyphen variants
    /// are tried before a compact alphanumeric fallback.
    pub fn parse(key: &str) -> Result<Self, ChannelParseError> {
        let raw = key.trim().to_lowercase();
        if raw.is_empty() {
            return Err(ChannelParseError(key.to_string()));
        }

        if let Some(channel) = Self::from_alias(&raw) {
            return Ok(channel);
        }

        // Space/hyphen variants
        let variants = [
            raw.replace(' ', "_"),
            raw.replace(' ', ""),
            raw.replace('-', "_"),
            raw.replace('-', ""),
            raw.replace(' ', "_").replace('-', "_"),
        ];
        for v in &variants {
            if let Some(channel) = Self::from_alias(v) {
                return Ok(channel);
            }
        }

        // Suffix heuristics: "zalo_push" -> "zalo", "facebook page" -> "facebook"
        for suffix in ["_push", "-push", " push", "_page", "-page", " page"] {
            if let Some(stripped) = raw.strip_suffix(suffix) {
                if let Some(channel) = Self::from_alias(stripped) {
                    return Ok(channel);
                }
            }
        }

        // Compact fallback: strip everything non-alphanumeric
        let compact: String = raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        Self::from_alias(&compact).ok_or(ChannelParseError(key.to_string()))
    }

    fn from_alias(key: &str) -> Option<Self> {
        match key {
            "email" | "email_channel" => Some(Channel::Email),
            "zalo" | "zalo_oa" | "zalooa" => Some(Channel::ZaloOa),
            "mobile_push" | "mobilepush" | "mobile_notification" => Some(Channel::MobilePush),
            "web_push" | "webpush" | "web_notification" => Some(Channel::WebPush),
            "facebook" | "facebook_page" | "facebookpage" | "fb" | "fb_page" | "fbpage" => {
                Some(Channel::FacebookPage)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Channel {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when a channel name cannot be resolved to a registered channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelParseError(pub String);

impl fmt::Display for ChannelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported channel: {}", self.0)
    }
}

impl std::error::Error for ChannelParseError {}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn channel_strategy() -> impl Strategy<Value = Channel> {
        prop_oneof![
            Just(Channel::Email),
            Just(Channel::ZaloOa),
            Just(Channel::MobilePush),
            Just(Channel::WebPush),
            Just(Channel::FacebookPage),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: parsing is case-insensitive over the canonical form.
        #[test]
        fn prop_channel_parse_case_insensitive(channel in channel_strategy()) {
            let upper = channel.as_db_str().to_uppercase();
            prop_assert_eq!(Channel::parse(&upper).unwrap(), channel);
        }

        /// Property: hyphenated variants of the canonical form resolve.
        #[test]
        fn prop_channel_parse_hyphen_variant(channel in channel_strategy()) {
            let hyphenated = channel.as_db_str().replace('_', "-");
            prop_assert_eq!(Channel::parse(&hyphenated).unwrap(), channel);
        }
    }
}
