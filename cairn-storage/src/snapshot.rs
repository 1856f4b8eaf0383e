//! Snapshot engine - point-in-time segment freezes
//!
//! A snapshot freezes a computed membership set at decision time so any
//! decision referencing it can be replayed byte-for-byte later, independent
//! of subsequent profile/segment drift. Header and members are persisted in
//! one all-or-nothing critical section; once created a snapshot is
//! immutable and no delete or member-removal path exists past the guarded
//! stubs below.

use crate::catalog::IdentityCatalog;
use crate::registry::TenantRegistry;
use cairn_core::{
    CairnResult, ProfileKey, SegmentDefinition, SegmentSnapshot, SnapshotError, SnapshotHandle,
    SnapshotRecord, StorageError, TenantId,
};
use cairn_context::TenantContext;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// The snapshot engine.
pub struct SnapshotEngine {
    registry: Arc<TenantRegistry>,
    catalog: Arc<IdentityCatalog>,
    snapshots: Arc<RwLock<HashMap<(TenantId, String), SnapshotRecord>>>,
}

impl SnapshotEngine {
    pub fn new(registry: Arc<TenantRegistry>, catalog: Arc<IdentityCatalog>) -> Self {
        Self {
            registry,
            catalog,
            snapshots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Evaluate the segment definition against current profile state and
    /// freeze the result under the caller-supplied snapshot id.
    ///
    /// Header and member rows become visible together: both are inserted
    /// inside a single write-lock scope, so no reader ever observes a
    /// header without its full member set. A duplicate snapshot id is an
    /// idempotent no-op returning the existing handle - the stored
    /// membership wins even if the definition has since drifted.
    pub fn create_snapshot(
        &self,
        ctx: &TenantContext,
        snapshot_id: &str,
        definition: &SegmentDefinition,
    ) -> CairnResult<SnapshotHandle> {
        let tenant_id = ctx.require()?;
        self.registry.ensure_active(tenant_id)?;

        // Evaluate membership outside the snapshot lock; only the freeze
        // itself needs the critical section.
        let members: BTreeSet<ProfileKey> = self
            .catalog
            .all_profiles(ctx)?
            .into_iter()
            .filter(|p| definition.matches(p))
            .map(|p| p.profile_key)
            .collect();

        let mut snapshots = self.write()?;
        if let Some(existing) = snapshots.get(&(tenant_id, snapshot_id.to_string())) {
            debug!(tenant_id = %tenant_id, snapshot_id, "duplicate snapshot create; returning existing handle");
            return Ok(existing.handle());
        }

        let record = SnapshotRecord {
            header: SegmentSnapshot {
                snapshot_id: snapshot_id.to_string(),
                tenant_id,
                segment: definition.segment.clone(),
                version: definition.version,
                member_count: members.len(),
                created_at: Utc::now(),
            },
            members,
        };
        let handle = record.handle();
        info!(
            tenant_id = %tenant_id,
            snapshot_id,
            members = handle.member_count,
            "segment snapshot frozen"
        );
        snapshots.insert((tenant_id, snapshot_id.to_string()), record);
        Ok(handle)
    }

    /// The frozen membership set. Stable for the life of the system.
    /// Empty for an unbound context (fail-closed read).
    pub fn get_members(
        &self,
        ctx: &TenantContext,
        snapshot_id: &str,
    ) -> CairnResult<BTreeSet<ProfileKey>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(BTreeSet::new());
        };
        let snapshots = self.read()?;
        let record = snapshots
            .get(&(tenant_id, snapshot_id.to_string()))
            .ok_or_else(|| SnapshotError::NotFound {
                snapshot_id: snapshot_id.to_string(),
            })?;
        Ok(record.members.clone())
    }

    /// The snapshot header, if it exists under the bound tenant.
    pub fn get_snapshot(
        &self,
        ctx: &TenantContext,
        snapshot_id: &str,
    ) -> CairnResult<Option<SegmentSnapshot>> {
        let Some(tenant_id) = ctx.tenant_id() else {
            return Ok(None);
        };
        let snapshots = self.read()?;
        Ok(snapshots
            .get(&(tenant_id, snapshot_id.to_string()))
            .map(|r| r.header.clone()))
    }

    /// Deleting a snapshot is not a supported operation; it always fails.
    /// The stub exists so the immutability contract is an explicit,
    /// testable refusal rather than a missing method.
    pub fn delete_snapshot(&self, _ctx: &TenantContext, snapshot_id: &str) -> CairnResult<()> {
        Err(SnapshotError::ImmutableSnapshot {
            snapshot_id: snapshot_id.to_string(),
            operation: "delete".to_string(),
        }
        .into())
    }

    /// Removing a member from a frozen snapshot always fails.
    pub fn remove_member(
        &self,
        _ctx: &TenantContext,
        snapshot_id: &str,
        _profile_key: &str,
    ) -> CairnResult<()> {
        Err(SnapshotError::ImmutableSnapshot {
            snapshot_id: snapshot_id.to_string(),
            operation: "remove_member".to_string(),
        }
        .into())
    }

    fn read(
        &self,
    ) -> Result<
        std::sync::RwLockReadGuard<'_, HashMap<(TenantId, String), SnapshotRecord>>,
        StorageError,
    > {
        self.snapshots.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(
        &self,
    ) -> Result<
        std::sync::RwLockWriteGuard<'_, HashMap<(TenantId, String), SnapshotRecord>>,
        StorageError,
    > {
        self.snapshots.write().map_err(|_| StorageError::LockPoisoned)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{CairnError, Profile, SegmentRef, SegmentRule};

    fn setup() -> (
        Arc<TenantRegistry>,
        Arc<IdentityCatalog>,
        SnapshotEngine,
        TenantContext,
    ) {
        let registry = Arc::new(TenantRegistry::new());
        let tenant = registry.create("acme").unwrap();
        let catalog = Arc::new(IdentityCatalog::new(registry.clone()));
        let engine = SnapshotEngine::new(registry.clone(), catalog.clone());
        let ctx = registry.bind(tenant.tenant_id).unwrap();
        (registry, catalog, engine, ctx)
    }

    fn vip_definition() -> SegmentDefinition {
        SegmentDefinition::new(
            SegmentRef::new("seg_vip", "VIP customers"),
            1,
            vec![SegmentRule::DataLabel("VIP".to_string())],
        )
    }

    fn seed_vip(catalog: &IdentityCatalog, ctx: &TenantContext, key: &str) {
        let tenant_id = ctx.tenant_id().unwrap();
        catalog
            .upsert_profile(
                ctx,
                Profile::new(tenant_id, key).with_data_labels(vec!["VIP".to_string()]),
            )
            .unwrap();
    }

    #[test]
    fn test_create_freezes_current_membership() {
        let (_registry, catalog, engine, ctx) = setup();
        seed_vip(&catalog, &ctx, "p_01");
        seed_vip(&catalog, &ctx, "p_02");

        let handle = engine
            .create_snapshot(&ctx, "SNAP_1", &vip_definition())
            .unwrap();
        assert_eq!(handle.member_count, 2);

        let members = engine.get_members(&ctx, "SNAP_1").unwrap();
        assert!(members.contains("p_01"));
        assert!(members.contains("p_02"));
    }

    #[test]
    fn test_membership_is_immune_to_drift() {
        let (_registry, catalog, engine, ctx) = setup();
        seed_vip(&catalog, &ctx, "p_01");
        engine
            .create_snapshot(&ctx, "SNAP_1", &vip_definition())
            .unwrap();

        // Profile drifts out of the segment after the freeze.
        let tenant_id = ctx.tenant_id().unwrap();
        catalog
            .upsert_profile(&ctx, Profile::new(tenant_id, "p_01"))
            .unwrap();
        // And a new VIP appears.
        seed_vip(&catalog, &ctx, "p_03");

        let members = engine.get_members(&ctx, "SNAP_1").unwrap();
        assert_eq!(members.len(), 1);
        assert!(members.contains("p_01"));
        assert!(!members.contains("p_03"));
    }

    #[test]
    fn test_duplicate_create_is_idempotent() {
        let (_registry, catalog, engine, ctx) = setup();
        seed_vip(&catalog, &ctx, "p_01");
        let first = engine
            .create_snapshot(&ctx, "SNAP_1", &vip_definition())
            .unwrap();

        // Membership changes between the two calls.
        seed_vip(&catalog, &ctx, "p_02");
        let second = engine
            .create_snapshot(&ctx, "SNAP_1", &vip_definition())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.get_members(&ctx, "SNAP_1").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_and_remove_member_always_fail() {
        let (_registry, catalog, engine, ctx) = setup();
        seed_vip(&catalog, &ctx, "p_01");
        engine
            .create_snapshot(&ctx, "SNAP_1", &vip_definition())
            .unwrap();

        assert!(matches!(
            engine.delete_snapshot(&ctx, "SNAP_1"),
            Err(CairnError::Snapshot(SnapshotError::ImmutableSnapshot { .. }))
        ));
        assert!(matches!(
            engine.remove_member(&ctx, "SNAP_1", "p_01"),
            Err(CairnError::Snapshot(SnapshotError::ImmutableSnapshot { .. }))
        ));
        // The refusal left everything intact.
        assert_eq!(engine.get_members(&ctx, "SNAP_1").unwrap().len(), 1);
    }

    #[test]
    fn test_get_members_unknown_snapshot_errors() {
        let (_registry, _catalog, engine, ctx) = setup();
        let result = engine.get_members(&ctx, "SNAP_MISSING");
        assert!(matches!(
            result,
            Err(CairnError::Snapshot(SnapshotError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_unbound_context_reads_empty() {
        let (_registry, catalog, engine, ctx) = setup();
        seed_vip(&catalog, &ctx, "p_01");
        engine
            .create_snapshot(&ctx, "SNAP_1", &vip_definition())
            .unwrap();

        let unbound = TenantContext::unbound();
        assert!(engine.get_members(&unbound, "SNAP_1").unwrap().is_empty());
        assert!(engine.get_snapshot(&unbound, "SNAP_1").unwrap().is_none());
        assert!(engine
            .create_snapshot(&unbound, "SNAP_2", &vip_definition())
            .is_err());
    }

    #[test]
    fn test_snapshots_are_tenant_scoped() {
        let (registry, catalog, engine, ctx) = setup();
        seed_vip(&catalog, &ctx, "p_01");
        engine
            .create_snapshot(&ctx, "SNAP_1", &vip_definition())
            .unwrap();

        let other = registry.create("globex").unwrap();
        let other_ctx = registry.bind(other.tenant_id).unwrap();
        // Same id under another tenant is a distinct, independent snapshot.
        let handle = engine
            .create_snapshot(&other_ctx, "SNAP_1", &vip_definition())
            .unwrap();
        assert_eq!(handle.member_count, 0);
        assert_eq!(engine.get_members(&ctx, "SNAP_1").unwrap().len(), 1);
    }
}
