//! Tenant registry - root identity and isolation domain
//!
//! The registry's own table is the bootstrap exception: its operations are
//! unscoped (there is no tenant to bind before tenants exist). Every other
//! component validates its bound tenant against this registry.

use cairn_core::{
    CairnResult, IsolationError, StorageError, Tenant, TenantId, TenantStatus,
};
use cairn_context::TenantContext;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Name of the default bootstrap tenant.
pub const MASTER_TENANT_NAME: &str = "master";

/// Registry of tenants. Unscoped (the bootstrap exception).
#[derive(Debug, Default)]
pub struct TenantRegistry {
    tenants: Arc<RwLock<HashMap<TenantId, Tenant>>>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new active tenant.
    pub fn create(&self, name: &str) -> CairnResult<Tenant> {
        let tenant = Tenant::new(name);
        let mut tenants = self.write()?;
        tenants.insert(tenant.tenant_id, tenant.clone());
        info!(tenant_id = %tenant.tenant_id, name = %tenant.name, "tenant created");
        Ok(tenant)
    }

    /// Create the default `master` tenant, or return it if it already exists.
    pub fn bootstrap_master(&self) -> CairnResult<Tenant> {
        {
            let tenants = self.read()?;
            if let Some(existing) = tenants
                .values()
                .find(|t| t.name == MASTER_TENANT_NAME && t.status != TenantStatus::Archived)
            {
                return Ok(existing.clone());
            }
        }
        self.create(MASTER_TENANT_NAME)
    }

    /// Get a tenant by id (unscoped admin read; archived tenants included).
    pub fn get(&self, tenant_id: TenantId) -> CairnResult<Option<Tenant>> {
        Ok(self.read()?.get(&tenant_id).cloned())
    }

    /// List tenants visible to scoped operations (non-archived).
    pub fn list_visible(&self) -> CairnResult<Vec<Tenant>> {
        let tenants = self.read()?;
        let mut visible: Vec<Tenant> = tenants
            .values()
            .filter(|t| t.status != TenantStatus::Archived)
            .cloned()
            .collect();
        visible.sort_by_key(|t| t.tenant_id);
        Ok(visible)
    }

    /// Suspend a tenant (reversible).
    pub fn suspend(&self, tenant_id: TenantId) -> CairnResult<()> {
        self.set_status(tenant_id, TenantStatus::Suspended)
    }

    /// Archive a tenant. Its data stays on disk but the tenant becomes
    /// invisible to every scoped operation.
    pub fn archive(&self, tenant_id: TenantId) -> CairnResult<()> {
        self.set_status(tenant_id, TenantStatus::Archived)
    }

    /// Reactivate a suspended tenant.
    pub fn reactivate(&self, tenant_id: TenantId) -> CairnResult<()> {
        self.set_status(tenant_id, TenantStatus::Active)
    }

    fn set_status(&self, tenant_id: TenantId, status: TenantStatus) -> CairnResult<()> {
        let mut tenants = self.write()?;
        let tenant = tenants
            .get_mut(&tenant_id)
            .ok_or(IsolationError::TenantNotFound { tenant_id })?;
        tenant.status = status;
        tenant.updated_at = Utc::now();
        info!(tenant_id = %tenant_id, status = ?status, "tenant status changed");
        Ok(())
    }

    /// Bind a session context to a tenant.
    ///
    /// Fails with `TenantNotFound` for unknown or archived tenants (archived
    /// tenants are invisible) and `TenantNotActive` for suspended ones.
    pub fn bind(&self, tenant_id: TenantId) -> CairnResult<TenantContext> {
        self.ensure_active(tenant_id)?;
        Ok(TenantContext::bound(tenant_id))
    }

    /// Bind, run, and clear - the scoped acquisition/release discipline.
    /// The binding is released even when `f` errors.
    pub fn with_bound<T>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&TenantContext) -> CairnResult<T>,
    ) -> CairnResult<T> {
        let mut ctx = self.bind(tenant_id)?;
        let result = f(&ctx);
        ctx.clear();
        result
    }

    /// Check that a tenant exists and is active; the guard every scoped
    /// write path runs before touching data.
    pub fn ensure_active(&self, tenant_id: TenantId) -> CairnResult<()> {
        let tenants = self.read()?;
        match tenants.get(&tenant_id) {
            None => Err(IsolationError::TenantNotFound { tenant_id }.into()),
            Some(t) => match t.status {
                TenantStatus::Active => Ok(()),
                // Archived tenants are invisible, not merely inactive.
                TenantStatus::Archived => {
                    Err(IsolationError::TenantNotFound { tenant_id }.into())
                }
                TenantStatus::Suspended => Err(IsolationError::TenantNotActive {
                    tenant_id,
                    status: "Suspended".to_string(),
                }
                .into()),
            },
        }
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<TenantId, Tenant>>, StorageError> {
        self.tenants.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<TenantId, Tenant>>, StorageError> {
        self.tenants.write().map_err(|_| StorageError::LockPoisoned)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::CairnError;
    use uuid::Uuid;

    #[test]
    fn test_create_and_get() {
        let registry = TenantRegistry::new();
        let tenant = registry.create("acme").unwrap();
        let fetched = registry.get(tenant.tenant_id).unwrap().unwrap();
        assert_eq!(fetched.name, "acme");
        assert_eq!(fetched.status, TenantStatus::Active);
    }

    #[test]
    fn test_bootstrap_master_is_idempotent() {
        let registry = TenantRegistry::new();
        let first = registry.bootstrap_master().unwrap();
        let second = registry.bootstrap_master().unwrap();
        assert_eq!(first.tenant_id, second.tenant_id);
        assert_eq!(first.name, MASTER_TENANT_NAME);
    }

    #[test]
    fn test_bind_unknown_tenant_fails() {
        let registry = TenantRegistry::new();
        let result = registry.bind(Uuid::now_v7());
        assert!(matches!(
            result,
            Err(CairnError::Isolation(IsolationError::TenantNotFound { .. }))
        ));
    }

    #[test]
    fn test_bind_suspended_tenant_fails() {
        let registry = TenantRegistry::new();
        let tenant = registry.create("acme").unwrap();
        registry.suspend(tenant.tenant_id).unwrap();
        let result = registry.bind(tenant.tenant_id);
        assert!(matches!(
            result,
            Err(CairnError::Isolation(IsolationError::TenantNotActive { .. }))
        ));
    }

    #[test]
    fn test_archived_tenant_is_invisible() {
        let registry = TenantRegistry::new();
        let tenant = registry.create("acme").unwrap();
        registry.archive(tenant.tenant_id).unwrap();

        // Bind reports NotFound, not NotActive: archived means invisible.
        let result = registry.bind(tenant.tenant_id);
        assert!(matches!(
            result,
            Err(CairnError::Isolation(IsolationError::TenantNotFound { .. }))
        ));

        // Data is not physically deleted: the admin read still sees it.
        assert!(registry.get(tenant.tenant_id).unwrap().is_some());
        assert!(registry.list_visible().unwrap().is_empty());
    }

    #[test]
    fn test_suspend_reactivate_roundtrip() {
        let registry = TenantRegistry::new();
        let tenant = registry.create("acme").unwrap();
        registry.suspend(tenant.tenant_id).unwrap();
        assert!(registry.bind(tenant.tenant_id).is_err());
        registry.reactivate(tenant.tenant_id).unwrap();
        assert!(registry.bind(tenant.tenant_id).is_ok());
    }

    #[test]
    fn test_with_bound_clears_after_use() {
        let registry = TenantRegistry::new();
        let tenant = registry.create("acme").unwrap();
        let seen = registry
            .with_bound(tenant.tenant_id, |ctx| {
                assert!(ctx.is_bound());
                Ok(ctx.tenant_id())
            })
            .unwrap();
        assert_eq!(seen, Some(tenant.tenant_id));
    }

    #[test]
    fn test_with_bound_releases_on_error() {
        let registry = TenantRegistry::new();
        let tenant = registry.create("acme").unwrap();
        let result: CairnResult<()> = registry.with_bound(tenant.tenant_id, |_ctx| {
            Err(IsolationError::NoTenantBound.into())
        });
        assert!(result.is_err());
        // A fresh bind still works; nothing was left half-open.
        assert!(registry.bind(tenant.tenant_id).is_ok());
    }
}
