//! Append-only ledger record types
//!
//! Three truth logs: behavioral events, delivery attempts, attributed
//! outcomes. Records are facts - they are appended once and never edited.
//! Corrections are new records (a settlement row references the pending row
//! it supersedes; nothing is updated in place).

use crate::{
    Channel, DeliveryId, DeliveryStatus, EntityId, EventKey, OutcomeKind, ProfileKey, TenantId,
    Timestamp,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A behavioral fact about a profile (page view, stock view, click, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralEvent {
    pub event_id: EntityId,
    pub tenant_id: TenantId,
    pub profile_key: ProfileKey,
    /// Semantic label (e.g. "VIEW_STOCK", "CLICK").
    pub label: String,
    /// Touchpoint the event occurred on, if known.
    pub touchpoint: Option<String>,
    pub payload: Option<serde_json::Value>,
    /// Per-tenant commit sequence, assigned by the ledger on append.
    pub seq: u64,
    pub recorded_at: Timestamp,
}

impl BehavioralEvent {
    pub fn new(tenant_id: TenantId, profile_key: &str, label: &str) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            tenant_id,
            profile_key: profile_key.to_string(),
            label: label.to_string(),
            touchpoint: None,
            payload: None,
            seq: 0,
            recorded_at: Utc::now(),
        }
    }

    /// Set the touchpoint.
    pub fn with_touchpoint(mut self, touchpoint: &str) -> Self {
        self.touchpoint = Some(touchpoint.to_string());
        self
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A delivery attempt fact.
///
/// The dispatcher appends a Pending row before any external send, then
/// appends a second row carrying the provider's verdict once the call
/// returns; `settles` links the verdict row back to the pending row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub delivery_id: DeliveryId,
    pub tenant_id: TenantId,
    pub profile_key: ProfileKey,
    pub event_key: EventKey,
    pub channel: Channel,
    pub status: DeliveryStatus,
    /// Pending row this row settles, if it is a verdict row.
    pub settles: Option<DeliveryId>,
    pub provider_response: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Per-tenant commit sequence, assigned by the ledger on append.
    pub seq: u64,
    pub recorded_at: Timestamp,
}

impl DeliveryAttempt {
    /// The Pending row appended before the external call.
    pub fn pending(
        tenant_id: TenantId,
        profile_key: &str,
        event_key: EventKey,
        channel: Channel,
    ) -> Self {
        Self {
            delivery_id: Uuid::now_v7(),
            tenant_id,
            profile_key: profile_key.to_string(),
            event_key,
            channel,
            status: DeliveryStatus::Pending,
            settles: None,
            provider_response: None,
            error: None,
            seq: 0,
            recorded_at: Utc::now(),
        }
    }

    /// A verdict row settling `pending` with the given status.
    pub fn settling(pending: &DeliveryAttempt, status: DeliveryStatus) -> Self {
        Self {
            delivery_id: Uuid::now_v7(),
            tenant_id: pending.tenant_id,
            profile_key: pending.profile_key.clone(),
            event_key: pending.event_key,
            channel: pending.channel,
            status,
            settles: Some(pending.delivery_id),
            provider_response: None,
            error: None,
            seq: 0,
            recorded_at: Utc::now(),
        }
    }

    /// Attach the provider's response.
    pub fn with_provider_response(mut self, response: serde_json::Value) -> Self {
        self.provider_response = Some(response);
        self
    }

    /// Attach an error message (for Failed rows).
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// An attributed outcome fact (outcome -> delivery -> profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub outcome_id: EntityId,
    pub tenant_id: TenantId,
    pub profile_key: ProfileKey,
    pub delivery_id: DeliveryId,
    pub event_key: EventKey,
    pub kind: OutcomeKind,
    /// Monetary or score value attributed to the outcome, if any.
    pub value: Option<f64>,
    /// Per-tenant commit sequence, assigned by the ledger on append.
    pub seq: u64,
    pub recorded_at: Timestamp,
}

impl OutcomeRecord {
    pub fn new(delivery: &DeliveryAttempt, kind: OutcomeKind) -> Self {
        Self {
            outcome_id: Uuid::now_v7(),
            tenant_id: delivery.tenant_id,
            profile_key: delivery.profile_key.clone(),
            delivery_id: delivery.delivery_id,
            event_key: delivery.event_key,
            kind,
            value: None,
            seq: 0,
            recorded_at: Utc::now(),
        }
    }

    /// Attach an attributed value.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKey;

    fn sample_key() -> EventKey {
        EventKey::derive(
            "Spring Sale",
            "promo",
            "email",
            Uuid::now_v7(),
            Uuid::now_v7(),
            Utc::now(),
        )
    }

    #[test]
    fn test_behavioral_event_builder() {
        let tenant = Uuid::now_v7();
        let event = BehavioralEvent::new(tenant, "p_01", "VIEW_STOCK")
            .with_touchpoint("web/quotes")
            .with_payload(serde_json::json!({"ticker": "AAPL"}));
        assert_eq!(event.tenant_id, tenant);
        assert_eq!(event.label, "VIEW_STOCK");
        assert_eq!(event.touchpoint.as_deref(), Some("web/quotes"));
        assert_eq!(event.seq, 0);
    }

    #[test]
    fn test_delivery_settlement_links_pending() {
        let pending = DeliveryAttempt::pending(Uuid::now_v7(), "p_01", sample_key(), Channel::Email);
        let sent = DeliveryAttempt::settling(&pending, DeliveryStatus::Sent)
            .with_provider_response(serde_json::json!({"message_id": "m-1"}));
        assert_eq!(sent.settles, Some(pending.delivery_id));
        assert_ne!(sent.delivery_id, pending.delivery_id);
        assert_eq!(sent.status, DeliveryStatus::Sent);
        assert_eq!(sent.event_key, pending.event_key);
    }

    #[test]
    fn test_outcome_references_delivery() {
        let pending = DeliveryAttempt::pending(Uuid::now_v7(), "p_01", sample_key(), Channel::Email);
        let outcome = OutcomeRecord::new(&pending, OutcomeKind::Click).with_value(12.5);
        assert_eq!(outcome.delivery_id, pending.delivery_id);
        assert_eq!(outcome.profile_key, pending.profile_key);
        assert_eq!(outcome.value, Some(12.5));
    }
}
