//! CAIRN Storage - the decision-and-audit storage engine
//!
//! Wires the components of the core: tenant registry, identity catalog,
//! append-only ledger, snapshot engine, decision record store, and the
//! enrichment work queue. Components share state through `Send + Sync`
//! structs over `Arc<RwLock<..>>` tables; sessions coordinate only through
//! these locks, never through shared mutable application state.

pub mod catalog;
pub mod decision;
pub mod ledger;
pub mod queue;
pub mod registry;
pub mod snapshot;

pub use catalog::{CatalogObserver, IdentityCatalog};
pub use decision::DecisionStore;
pub use ledger::AppendOnlyLedger;
pub use queue::WorkQueue;
pub use registry::{TenantRegistry, MASTER_TENANT_NAME};
pub use snapshot::SnapshotEngine;

use cairn_core::{
    CairnConfig, CairnResult, CatalogError, Channel, ContactPoint, DecisionError, DecisionRecord,
    DeliveryAttempt, DeliveryStatus, EmbedJob, EmbeddingVector, EntityKind, EventKey, JobId,
    MarketingEvent, OutcomeRecord, Profile, ProfileKey, SegmentSnapshot, SnapshotError, TaskId,
};
use cairn_context::TenantContext;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Everything a replay of one decision recovers: the decision itself, the
/// frozen snapshot it targeted, the definitional entity it chose, and the
/// delivery/outcome facts that followed. No referenced record may be
/// orphaned or unreachable.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTrace {
    pub decision: DecisionRecord,
    pub snapshot: SegmentSnapshot,
    pub members: BTreeSet<ProfileKey>,
    pub profiles: Vec<Profile>,
    pub event: MarketingEvent,
    pub deliveries: Vec<DeliveryAttempt>,
    pub outcomes: Vec<OutcomeRecord>,
}

/// The assembled engine.
pub struct CairnStore {
    registry: Arc<TenantRegistry>,
    catalog: Arc<IdentityCatalog>,
    ledger: Arc<AppendOnlyLedger>,
    snapshots: Arc<SnapshotEngine>,
    decisions: Arc<DecisionStore>,
    queue: Arc<WorkQueue>,
}

impl CairnStore {
    /// Build the engine and wire the catalog's enrichment hook to the
    /// work queue.
    pub fn new(config: CairnConfig) -> CairnResult<Self> {
        config.validate()?;
        let registry = Arc::new(TenantRegistry::new());
        let catalog = Arc::new(IdentityCatalog::new(registry.clone()));
        let ledger = Arc::new(AppendOnlyLedger::new(registry.clone(), &config));
        let snapshots = Arc::new(SnapshotEngine::new(registry.clone(), catalog.clone()));
        let decisions = Arc::new(DecisionStore::new(registry.clone(), &config));
        let queue = Arc::new(WorkQueue::new(&config));
        catalog.register_observer(queue.clone())?;
        Ok(Self {
            registry,
            catalog,
            ledger,
            snapshots,
            decisions,
            queue,
        })
    }

    pub fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &IdentityCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &AppendOnlyLedger {
        &self.ledger
    }

    pub fn snapshots(&self) -> &SnapshotEngine {
        &self.snapshots
    }

    pub fn decisions(&self) -> &DecisionStore {
        &self.decisions
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    // === Dispatch support ===

    /// Validate a raw contact point against the event's channel and append
    /// the opening delivery row: Pending when the contact parses, Failed
    /// carrying the validation error when it does not. A malformed contact
    /// point becomes a durable ledger fact; it never aborts the caller.
    pub fn open_delivery(
        &self,
        ctx: &TenantContext,
        profile_key: &str,
        event_key: EventKey,
        raw_contact: &str,
    ) -> CairnResult<DeliveryAttempt> {
        let tenant_id = ctx.require()?;
        let event =
            self.catalog
                .get_event(ctx, event_key)?
                .ok_or_else(|| CatalogError::NotFound {
                    kind: EntityKind::MarketingEvent,
                    key: event_key.to_string(),
                })?;

        let validation = match event.channel {
            Channel::Email => ContactPoint::email(raw_contact).map(|_| ()),
            Channel::ZaloOa => ContactPoint::phone(raw_contact).map(|_| ()),
            // Push/page channels address profiles by platform identity;
            // the token is opaque to this core.
            _ => Ok(()),
        };

        let row = DeliveryAttempt::pending(tenant_id, profile_key, event_key, event.channel);
        match validation {
            Ok(()) => self.ledger.append_delivery(ctx, row),
            Err(err) => {
                warn!(profile_key, event_key = %event_key, %err, "malformed contact point recorded as failed delivery");
                let mut failed = row;
                failed.status = DeliveryStatus::Failed;
                failed.error = Some(err.to_string());
                self.ledger.append_delivery(ctx, failed)
            }
        }
    }

    // === Enrichment worker support ===

    /// Store a worker's computed vector and complete its job.
    pub fn complete_embedding(
        &self,
        job_id: JobId,
        vector: EmbeddingVector,
    ) -> CairnResult<EmbedJob> {
        let job = self.queue.complete(job_id)?;
        self.catalog
            .attach_event_embedding(job.tenant_id, job.event_key, vector)?;
        Ok(job)
    }

    /// Record a worker failure. While attempts remain the job returns to
    /// Pending; at the ceiling the job and the event's embedding status
    /// are durably marked Failed and the exhaustion error propagates.
    pub fn fail_embedding(&self, job_id: JobId, error: &str) -> CairnResult<EmbedJob> {
        match self.queue.fail(job_id, error) {
            Ok(job) => Ok(job),
            Err(err) => {
                if let Some(job) = self.queue.get(job_id)? {
                    if job.is_terminal() {
                        self.catalog
                            .mark_event_embedding_failed(job.tenant_id, job.event_key)?;
                    }
                }
                Err(err)
            }
        }
    }

    // === Replay ===

    /// Recover, from a decision task id alone, everything the decision
    /// touched: the snapshot (header and frozen members), the member
    /// profiles, the definitional entity, and the delivery and outcome
    /// facts that followed. Fails loudly if any referenced record is
    /// missing - absence of a record is never acceptable for something
    /// that was attempted.
    pub fn replay(&self, ctx: &TenantContext, task_id: TaskId) -> CairnResult<DecisionTrace> {
        let decision = self
            .decisions
            .get(ctx, task_id)?
            .ok_or(DecisionError::NotFound { task_id })?;

        let snapshot = self
            .snapshots
            .get_snapshot(ctx, &decision.snapshot_id)?
            .ok_or_else(|| SnapshotError::NotFound {
                snapshot_id: decision.snapshot_id.clone(),
            })?;
        let members = self.snapshots.get_members(ctx, &decision.snapshot_id)?;

        let mut profiles = Vec::with_capacity(members.len());
        for key in &members {
            if let Some(profile) = self.catalog.get_profile(ctx, key)? {
                profiles.push(profile);
            }
        }

        let event = self
            .catalog
            .get_event(ctx, decision.event_key)?
            .ok_or_else(|| CatalogError::NotFound {
                kind: EntityKind::MarketingEvent,
                key: decision.event_key.to_string(),
            })?;

        let deliveries = self.ledger.deliveries_for_event(ctx, decision.event_key)?;
        let mut outcomes = Vec::new();
        for delivery in &deliveries {
            outcomes.extend(self.ledger.outcomes_for_delivery(ctx, delivery.delivery_id)?);
        }
        outcomes.sort_by_key(|o| o.seq);
        outcomes.dedup_by_key(|o| o.outcome_id);

        Ok(DecisionTrace {
            decision,
            snapshot,
            members,
            profiles,
            event,
            deliveries,
            outcomes,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
