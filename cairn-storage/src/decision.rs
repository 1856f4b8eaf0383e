//! Decision record store
//!
//! One row per agent decision. Transitions are linearizable per task:
//! preconditions are validated and applied under the table's write lock,
//! so no two transitions for the same task commit out of order. Every
//! transition is timestamped in the record's log and never reversed.

use crate::registry::TenantRegistry;
use cairn_core::{
    CairnConfig, CairnResult, DecisionError, DecisionReasoning, DecisionRecord, DecisionStatus,
    EventKey, StorageError, TaskId,
};
use cairn_context::TenantContext;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// The decision record store.
pub struct DecisionStore {
    registry: Arc<TenantRegistry>,
    max_attempts: u32,
    records: Arc<RwLock<HashMap<TaskId, DecisionRecord>>>,
}

impl DecisionStore {
    pub fn new(registry: Arc<TenantRegistry>, config: &CairnConfig) -> Self {
        Self {
            registry,
            max_attempts: config.max_decision_attempts,
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a pending decision referencing a snapshot and a definitional
    /// entity. The task id is caller-supplied and must be new.
    pub fn record(
        &self,
        ctx: &TenantContext,
        task_id: TaskId,
        snapshot_id: &str,
        event_key: EventKey,
        reasoning: DecisionReasoning,
    ) -> CairnResult<DecisionRecord> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        let mut records = self.write()?;
        if records.contains_key(&task_id) {
            return Err(DecisionError::Duplicate { task_id }.into());
        }
        let record = DecisionRecord::new(task_id, tenant_id, snapshot_id, event_key, reasoning);
        debug!(tenant_id = %tenant_id, task_id = %task_id, snapshot_id, "decision recorded");
        records.insert(task_id, record.clone());
        Ok(record)
    }

    /// Complete a pending decision.
    pub fn complete(
        &self,
        ctx: &TenantContext,
        task_id: TaskId,
        outcome: &str,
    ) -> CairnResult<DecisionRecord> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        let mut records = self.write()?;
        let record = records
            .get_mut(&task_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or(DecisionError::NotFound { task_id })?;
        if record.status != DecisionStatus::Pending {
            return Err(DecisionError::InvalidTransition {
                task_id,
                from: format!("{:?}", record.status),
                to: "Completed".to_string(),
            }
            .into());
        }
        record.complete(outcome);
        debug!(task_id = %task_id, "decision completed");
        Ok(record.clone())
    }

    /// Fail a pending decision.
    ///
    /// A retryable failure re-arms Pending while attempts remain under the
    /// ceiling; once the ceiling is hit the record is durably marked
    /// Failed and the exhaustion is surfaced as an error. A non-retryable
    /// failure is terminal immediately.
    pub fn fail(
        &self,
        ctx: &TenantContext,
        task_id: TaskId,
        error: &str,
        retryable: bool,
    ) -> CairnResult<DecisionRecord> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;
        let mut records = self.write()?;
        let record = records
            .get_mut(&task_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or(DecisionError::NotFound { task_id })?;
        if record.status != DecisionStatus::Pending {
            return Err(DecisionError::InvalidTransition {
                task_id,
                from: format!("{:?}", record.status),
                to: "Failed".to_string(),
            }
            .into());
        }

        if !retryable {
            record.fail(error);
            debug!(task_id = %task_id, error, "decision failed terminally");
            return Ok(record.clone());
        }

        if record.attempts + 1 >= self.max_attempts {
            record.attempts += 1;
            record.fail(error);
            warn!(task_id = %task_id, attempts = record.attempts, "decision retries exhausted");
            return Err(DecisionError::RetryExhausted {
                task_id,
                attempts: record.attempts,
            }
            .into());
        }

        record.rearm(error);
        debug!(task_id = %task_id, attempts = record.attempts, "decision re-armed for retry");
        Ok(record.clone())
    }

    /// Get a decision record by task id.
    pub fn get(&self, ctx: &TenantContext, task_id: TaskId) -> CairnResult<Option<DecisionRecord>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(None);
        };
        let records = self.read()?;
        Ok(records
            .get(&task_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    /// Decision records in a status, oldest first.
    pub fn list_by_status(
        &self,
        ctx: &TenantContext,
        status: DecisionStatus,
    ) -> CairnResult<Vec<DecisionRecord>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(Vec::new());
        };
        let records = self.read()?;
        let mut matched: Vec<DecisionRecord> = records
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.status == status)
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.created_at);
        Ok(matched)
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<TaskId, DecisionRecord>>, StorageError> {
        self.records.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<TaskId, DecisionRecord>>, StorageError>
    {
        self.records.write().map_err(|_| StorageError::LockPoisoned)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::CairnError;
    use chrono::Utc;
    use uuid::Uuid;

    fn setup() -> (Arc<TenantRegistry>, DecisionStore, TenantContext) {
        let registry = Arc::new(TenantRegistry::new());
        let tenant = registry.create("acme").unwrap();
        let store = DecisionStore::new(registry.clone(), &CairnConfig::default());
        let ctx = registry.bind(tenant.tenant_id).unwrap();
        (registry, store, ctx)
    }

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

    fn record_task(store: &DecisionStore, ctx: &TenantContext) -> TaskId {
        let task_id = Uuid::now_v7();
        store
            .record(
                ctx,
                task_id,
                "SNAP_1",
                sample_key(),
                DecisionReasoning::new("vip segment, email consented"),
            )
            .unwrap();
        task_id
    }

    #[test]
    fn test_record_and_complete() {
        let (_registry, store, ctx) = setup();
        let task_id = record_task(&store, &ctx);

        let completed = store.complete(&ctx, task_id, "dispatched").unwrap();
        assert_eq!(completed.status, DecisionStatus::Completed);
        assert_eq!(completed.transitions.len(), 1);
    }

    #[test]
    fn test_duplicate_task_id_rejected() {
        let (_registry, store, ctx) = setup();
        let task_id = record_task(&store, &ctx);
        let result = store.record(
            &ctx,
            task_id,
            "SNAP_2",
            sample_key(),
            DecisionReasoning::new("again"),
        );
        assert!(matches!(
            result,
            Err(CairnError::Decision(DecisionError::Duplicate { .. }))
        ));
    }

    #[test]
    fn test_terminal_records_reject_further_transitions() {
        let (_registry, store, ctx) = setup();
        let task_id = record_task(&store, &ctx);
        store.complete(&ctx, task_id, "done").unwrap();

        assert!(matches!(
            store.complete(&ctx, task_id, "again"),
            Err(CairnError::Decision(DecisionError::InvalidTransition { .. }))
        ));
        assert!(matches!(
            store.fail(&ctx, task_id, "late failure", true),
            Err(CairnError::Decision(DecisionError::InvalidTransition { .. }))
        ));
    }

    #[test]
    fn test_retryable_failure_rearms_until_ceiling() {
        let (_registry, store, ctx) = setup();
        let task_id = record_task(&store, &ctx);

        // Attempts 1 and 2 re-arm.
        let first = store.fail(&ctx, task_id, "timeout", true).unwrap();
        assert_eq!(first.status, DecisionStatus::Pending);
        assert_eq!(first.attempts, 1);
        let second = store.fail(&ctx, task_id, "timeout", true).unwrap();
        assert_eq!(second.status, DecisionStatus::Pending);
        assert_eq!(second.attempts, 2);

        // Attempt 3 hits the default ceiling: durable terminal failure,
        // surfaced as RetryExhausted.
        let third = store.fail(&ctx, task_id, "timeout", true);
        assert!(matches!(
            third,
            Err(CairnError::Decision(DecisionError::RetryExhausted { attempts: 3, .. }))
        ));
        let stored = store.get(&ctx, task_id).unwrap().unwrap();
        assert_eq!(stored.status, DecisionStatus::Failed);
        assert_eq!(stored.attempts, 3);
    }

    #[test]
    fn test_non_retryable_failure_is_terminal_immediately() {
        let (_registry, store, ctx) = setup();
        let task_id = record_task(&store, &ctx);
        let failed = store.fail(&ctx, task_id, "bad snapshot ref", false).unwrap();
        assert_eq!(failed.status, DecisionStatus::Failed);
        assert_eq!(failed.attempts, 0);
    }

    #[test]
    fn test_transition_log_grows_monotonically() {
        let (_registry, store, ctx) = setup();
        let task_id = record_task(&store, &ctx);
        store.fail(&ctx, task_id, "timeout", true).unwrap();
        store.complete(&ctx, task_id, "second try worked").unwrap();

        let record = store.get(&ctx, task_id).unwrap().unwrap();
        // rearm logs two transitions, complete logs one.
        assert_eq!(record.transitions.len(), 3);
        for window in record.transitions.windows(2) {
            assert!(window[0].at <= window[1].at);
        }
    }

    #[test]
    fn test_unbound_and_cross_tenant_access() {
        let (registry, store, ctx) = setup();
        let task_id = record_task(&store, &ctx);

        let unbound = TenantContext::unbound();
        assert!(store.get(&unbound, task_id).unwrap().is_none());
        assert!(store
            .record(
                &unbound,
                Uuid::now_v7(),
                "SNAP_1",
                sample_key(),
                DecisionReasoning::new("x")
            )
            .is_err());

        let other = registry.create("globex").unwrap();
        let other_ctx = registry.bind(other.tenant_id).unwrap();
        assert!(store.get(&other_ctx, task_id).unwrap().is_none());
        assert!(matches!(
            store.complete(&other_ctx, task_id, "hijack"),
            Err(CairnError::Decision(DecisionError::NotFound { .. }))
        ));
    }
}
