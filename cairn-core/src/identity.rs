//! Identity types for CAIRN entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Tenant identifier - the root of every isolation scope.
pub type TenantId = Uuid;

/// Campaign identifier.
pub type CampaignId = Uuid;

/// Message template identifier.
pub type TemplateId = Uuid;

/// Delivery attempt identifier.
pub type DeliveryId = Uuid;

/// Work-queue job identifier.
pub type JobId = Uuid;

/// Decision task identifier (caller-supplied, opaque).
pub type TaskId = Uuid;

/// Tenant-unique external key for a profile (sourced from the upstream CDP).
pub type ProfileKey = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash for deterministic identity and integrity checks.
pub type ContentHash = [u8; 32];

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

// ============================================================================
// EVENT KEY (content-addressed definitional identity)
// ============================================================================

/// Deterministic identifier of a definitional entity (a marketing event).
///
/// Computed once at creation as SHA-256 over the canonical tuple of the
/// entity's defining fields; content edits after creation never change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(ContentHash);

impl EventKey {
    /// Compute the key from the canonical defining tuple.
    ///
    /// The creation timestamp is part of the tuple: identity is
    /// unique-per-attempt, not idempotent-by-content. Two entities whose
    /// tuples differ only by timestamp are distinct; callers wanting true
    /// dedup supply their own idempotency key upstream.
    pub fn derive(
        name: &str,
        event_type: &str,
        channel: &str,
        campaign_id: CampaignId,
        tenant_id: TenantId,
        created_at: Timestamp,
    ) -> Self {
        let canonical = format!(
            "{}\x1f{}\x1f{}\x1f{}\x1f{}\x1f{}",
            name,
            event_type,
            channel,
            campaign_id,
            tenant_id,
            created_at.timestamp_micros(),
        );
        EventKey(compute_content_hash(canonical.as_bytes()))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &ContentHash {
        &self.0
    }

    /// Construct from a raw digest (e.g. loaded from storage).
    pub fn from_bytes(bytes: ContentHash) -> Self {
        EventKey(bytes)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for EventKey {
    type Err = EventKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = hex::decode(s).map_err(|_| EventKeyParseError(s.to_string()))?;
        let bytes: ContentHash = decoded
            .try_into()
            .map_err(|_| EventKeyParseError(s.to_string()))?;
        Ok(EventKey(bytes))
    }
}

impl Serialize for EventKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EventKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error when parsing an invalid event key string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventKeyParseError(pub String);

impl fmt::Display for EventKeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid event key: {}", self.0)
    }
}

impl std::error::Error for EventKeyParseError {}

// ============================================================================
// TESTS
// ============================================================================
