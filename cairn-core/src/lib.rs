//! CAIRN Core - Entity Types
//!
//! Pure data structures for the CAIRN decision-and-audit store. All other
//! crates depend on this. This crate contains ONLY data types, identity
//! computation, and validation - no storage logic.

mod config;
mod contact;
mod decision;
mod embedding;
mod entities;
mod enums;
mod error;
mod identity;
mod job;
mod ledger;
mod segment;

pub use config::CairnConfig;
pub use contact::ContactPoint;
pub use decision::{DecisionReasoning, DecisionRecord, DecisionTransition};
pub use embedding::EmbeddingVector;
pub use entities::{
    AffinityScore, Campaign, MarketingEvent, MessageTemplate, Profile, SegmentRef, Tenant,
};
pub use enums::{
    CampaignStatus, Channel, ChannelParseError, ConsentState, DecisionStatus, DeliveryStatus,
    EmbeddingStatus, EntityKind, JobStatus, OutcomeKind, TenantStatus,
};
pub use error::{
    CairnError, CairnResult, CatalogError, ConfigError, DecisionError, IsolationError, LedgerError,
    QueueError, SnapshotError, StorageError,
};
pub use identity::{
    compute_content_hash, new_entity_id, CampaignId, ContentHash, DeliveryId, EntityId, EventKey,
    EventKeyParseError, JobId, ProfileKey, TaskId, TemplateId, TenantId, Timestamp,
};
pub use job::EmbedJob;
pub use ledger::{BehavioralEvent, DeliveryAttempt, OutcomeRecord};
pub use segment::{
    SegmentDefinition, SegmentRule, SegmentSnapshot, SnapshotHandle, SnapshotRecord,
};
