//! Append-only ledger - behavioral events, delivery attempts, outcomes
//!
//! Exposes only appends and filtered range reads. No update or delete is
//! ever exposed past creation; corrections are new records. Within one
//! tenant, appends are observed in commit order by any range scan: a
//! per-tenant sequence is assigned under the same write lock that stores
//! the record, so two concurrent appenders never interleave partial rows.
//!
//! Behavioral events are internally partitioned by (UTC day, tenant-hash
//! bucket). Partitioning is a scaling mechanism, not a correctness one: it
//! bounds the working set of a write and lets retention drop old days
//! wholesale. Every filtered read supplies the tenant key (from the bound
//! context) to hit the efficient path.

use crate::registry::TenantRegistry;
use cairn_core::{
    BehavioralEvent, CairnConfig, CairnResult, DeliveryAttempt, DeliveryId, OutcomeRecord,
    StorageError, TenantId, Timestamp,
};
use cairn_context::TenantContext;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Partition key for the behavioral log: day first so retention can drop a
/// whole prefix of the map, bucket second to bound per-write working sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PartitionKey {
    day: NaiveDate,
    bucket: u32,
}

fn tenant_bucket(tenant_id: TenantId, buckets: u32) -> u32 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    tenant_id.hash(&mut hasher);
    (hasher.finish() % u64::from(buckets)) as u32
}

/// All ledger state behind one lock: appends assign the per-tenant
/// sequence and store the row in a single critical section.
#[derive(Debug, Default)]
struct LedgerInner {
    behavioral: BTreeMap<PartitionKey, Vec<BehavioralEvent>>,
    deliveries: HashMap<TenantId, Vec<DeliveryAttempt>>,
    outcomes: HashMap<TenantId, Vec<OutcomeRecord>>,
    seqs: HashMap<TenantId, u64>,
}

impl LedgerInner {
    fn next_seq(&mut self, tenant_id: TenantId) -> u64 {
        let seq = self.seqs.entry(tenant_id).or_insert(0);
        *seq += 1;
        *seq
    }
}

/// The three truth logs.
pub struct AppendOnlyLedger {
    registry: Arc<TenantRegistry>,
    buckets: u32,
    inner: Arc<RwLock<LedgerInner>>,
}

impl AppendOnlyLedger {
    pub fn new(registry: Arc<TenantRegistry>, config: &CairnConfig) -> Self {
        Self {
            registry,
            buckets: config.ledger_tenant_buckets,
            inner: Arc::new(RwLock::new(LedgerInner::default())),
        }
    }

    // === Appends ===

    /// Append a behavioral event. Returns the stored record with its
    /// per-tenant commit sequence assigned.
    pub fn append_behavioral(
        &self,
        ctx: &TenantContext,
        mut event: BehavioralEvent,
    ) -> CairnResult<BehavioralEvent> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        event.tenant_id = tenant_id;
        let mut inner = self.write()?;
        event.seq = inner.next_seq(tenant_id);
        let key = PartitionKey {
            day: event.recorded_at.date_naive(),
            bucket: tenant_bucket(tenant_id, self.buckets),
        };
        debug!(tenant_id = %tenant_id, seq = event.seq, label = %event.label, "behavioral event appended");
        inner.behavioral.entry(key).or_default().push(event.clone());
        Ok(event)
    }

    /// Append a delivery attempt row (pending or settling).
    pub fn append_delivery(
        &self,
        ctx: &TenantContext,
        mut delivery: DeliveryAttempt,
    ) -> CairnResult<DeliveryAttempt> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        delivery.tenant_id = tenant_id;
        let mut inner = self.write()?;
        delivery.seq = inner.next_seq(tenant_id);
        debug!(
            tenant_id = %tenant_id,
            delivery_id = %delivery.delivery_id,
            status = ?delivery.status,
            "delivery attempt appended"
        );
        inner
            .deliveries
            .entry(tenant_id)
            .or_default()
            .push(delivery.clone());
        Ok(delivery)
    }

    /// Append an attributed outcome. The referenced delivery attempt must
    /// already exist in this tenant's log (outcome -> delivery -> profile
    /// is a hard chain; an outcome can never dangle).
    pub fn append_outcome(
        &self,
        ctx: &TenantContext,
        mut outcome: OutcomeRecord,
    ) -> CairnResult<OutcomeRecord> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        outcome.tenant_id = tenant_id;
        let mut inner = self.write()?;
        let delivery_exists = inner
            .deliveries
            .get(&tenant_id)
            .map(|rows| rows.iter().any(|d| d.delivery_id == outcome.delivery_id))
            .unwrap_or(false);
        if !delivery_exists {
            return Err(cairn_core::LedgerError::DeliveryNotFound {
                delivery_id: outcome.delivery_id,
            }
            .into());
        }
        outcome.seq = inner.next_seq(tenant_id);
        debug!(tenant_id = %tenant_id, outcome_id = %outcome.outcome_id, kind = ?outcome.kind, "outcome appended");
        inner
            .outcomes
            .entry(tenant_id)
            .or_default()
            .push(outcome.clone());
        Ok(outcome)
    }

    // === Reads (fail-closed: unbound context reads empty) ===

    /// Behavioral events for a profile, in commit order.
    pub fn behavioral_for_profile(
        &self,
        ctx: &TenantContext,
        profile_key: &str,
    ) -> CairnResult<Vec<BehavioralEvent>> {
        self.scan_behavioral(ctx, |e| e.profile_key == profile_key)
    }

    /// Behavioral events inside a time window, in commit order.
    pub fn behavioral_in_window(
        &self,
        ctx: &TenantContext,
        from: Timestamp,
        to: Timestamp,
    ) -> CairnResult<Vec<BehavioralEvent>> {
        self.scan_behavioral(ctx, |e| e.recorded_at >= from && e.recorded_at < to)
    }

    /// All behavioral events for the bound tenant, in commit order.
    pub fn behavioral_all(&self, ctx: &TenantContext) -> CairnResult<Vec<BehavioralEvent>> {
        self.scan_behavioral(ctx, |_| true)
    }

    fn scan_behavioral(
        &self,
        ctx: &TenantContext,
        pred: impl Fn(&BehavioralEvent) -> bool,
    ) -> CairnResult<Vec<BehavioralEvent>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(Vec::new());
        };
        let bucket = tenant_bucket(tenant_id, self.buckets);
        let inner = self.read()?;
        let mut matched: Vec<BehavioralEvent> = inner
            .behavioral
            .iter()
            .filter(|(key, _)| key.bucket == bucket)
            .flat_map(|(_, rows)| rows.iter())
            .filter(|e| e.tenant_id == tenant_id && pred(e))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.seq);
        Ok(matched)
    }

    /// Delivery attempts for a profile, in commit order.
    pub fn deliveries_for_profile(
        &self,
        ctx: &TenantContext,
        profile_key: &str,
    ) -> CairnResult<Vec<DeliveryAttempt>> {
        self.scan_deliveries(ctx, |d| d.profile_key == profile_key)
    }

    /// Delivery attempts for a definitional entity, in commit order.
    pub fn deliveries_for_event(
        &self,
        ctx: &TenantContext,
        event_key: cairn_core::EventKey,
    ) -> CairnResult<Vec<DeliveryAttempt>> {
        self.scan_deliveries(ctx, |d| d.event_key == event_key)
    }

    /// A single delivery attempt row by id.
    pub fn delivery_by_id(
        &self,
        ctx: &TenantContext,
        delivery_id: DeliveryId,
    ) -> CairnResult<Option<DeliveryAttempt>> {
        Ok(self
            .scan_deliveries(ctx, |d| d.delivery_id == delivery_id)?
            .into_iter()
            .next())
    }

    fn scan_deliveries(
        &self,
        ctx: &TenantContext,
        pred: impl Fn(&DeliveryAttempt) -> bool,
    ) -> CairnResult<Vec<DeliveryAttempt>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(Vec::new());
        };
        let inner = self.read()?;
        let mut matched: Vec<DeliveryAttempt> = inner
            .deliveries
            .get(&tenant_id)
            .map(|rows| rows.iter().filter(|d| pred(d)).cloned().collect())
            .unwrap_or_default();
        matched.sort_by_key(|d| d.seq);
        Ok(matched)
    }

    /// Outcomes attributed to a delivery, in commit order.
    pub fn outcomes_for_delivery(
        &self,
        ctx: &TenantContext,
        delivery_id: DeliveryId,
    ) -> CairnResult<Vec<OutcomeRecord>> {
        self.scan_outcomes(ctx, |o| o.delivery_id == delivery_id)
    }

    /// Outcomes for a profile, in commit order.
    pub fn outcomes_for_profile(
        &self,
        ctx: &TenantContext,
        profile_key: &str,
    ) -> CairnResult<Vec<OutcomeRecord>> {
        self.scan_outcomes(ctx, |o| o.profile_key == profile_key)
    }

    fn scan_outcomes(
        &self,
        ctx: &TenantContext,
        pred: impl Fn(&OutcomeRecord) -> bool,
    ) -> CairnResult<Vec<OutcomeRecord>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(Vec::new());
        };
        let inner = self.read()?;
        let mut matched: Vec<OutcomeRecord> = inner
            .outcomes
            .get(&tenant_id)
            .map(|rows| rows.iter().filter(|o| pred(o)).cloned().collect())
            .unwrap_or_default();
        matched.sort_by_key(|o| o.seq);
        Ok(matched)
    }

    // === Retention ===

    /// Drop whole behavioral-event day-partitions older than the cutoff.
    /// Registry-level maintenance, wholesale only: no row inside a retained
    /// partition is ever touched. Returns the number of partitions dropped.
    pub fn drop_partitions_before(&self, cutoff: NaiveDate) -> CairnResult<usize> {
        let mut inner = self.write()?;
        let keep = inner.behavioral.split_off(&PartitionKey {
            day: cutoff,
            bucket: 0,
        });
        let dropped = inner.behavioral.len();
        inner.behavioral = keep;
        if dropped > 0 {
            info!(cutoff = %cutoff, dropped, "behavioral partitions dropped for retention");
        }
        Ok(dropped)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerInner>, StorageError> {
        self.inner.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, LedgerInner>, StorageError> {
        self.inner.write().map_err(|_| StorageError::LockPoisoned)
    }
}

// ============================================================================
// TESTS
// ============================================================================
