//! CAIRN Context - Per-Session Tenant Isolation
//!
//! The isolation context is an explicit value passed into every storage
//! call, never a process-wide global. Isolation is fail-closed: with no
//! tenant bound, scoped reads return empty result sets and scoped writes
//! fail with an isolation error - enforced by the storage layer itself,
//! never trusted to caller discipline.
//!
//! The private inner struct ensures a bound context can ONLY be constructed
//! through `TenantContext::bound`, so every scoped operation carries an
//! explicit tenant by construction. Validation that the tenant exists and
//! is active belongs to the tenant registry's `bind` path.

use cairn_core::{IsolationError, TenantId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Private inner data of a bound context - prevents external construction
/// of a "half-bound" value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BoundTenant {
    tenant_id: TenantId,
    bound_at: Timestamp,
}

/// The per-session isolation context.
///
/// Not `Clone`: a context belongs to exactly one session and must never
/// be shared across concurrent sessions. Rebinding or clearing mutates
/// the session's own value.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
    inner: Option<BoundTenant>,
}

impl TenantContext {
    /// A context with no tenant bound. All scoped reads against it return
    /// empty; all scoped writes fail.
    pub fn unbound() -> Self {
        Self { inner: None }
    }

    /// A context bound to a tenant.
    ///
    /// This is the raw constructor; `TenantRegistry::bind` is the validated
    /// path and fails for unknown or non-active tenants. Binding an
    /// arbitrary id here cannot widen access: storage write paths re-check
    /// the tenant against the registry.
    pub fn bound(tenant_id: TenantId) -> Self {
        Self {
            inner: Some(BoundTenant {
                tenant_id,
                bound_at: Utc::now(),
            }),
        }
    }

    /// The bound tenant id, if any.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.inner.as_ref().map(|b| b.tenant_id)
    }

    /// When the current binding was taken.
    pub fn bound_at(&self) -> Option<Timestamp> {
        self.inner.as_ref().map(|b| b.bound_at)
    }

    /// Whether a tenant is bound.
    pub fn is_bound(&self) -> bool {
        self.inner.is_some()
    }

    /// The bound tenant id, or the fail-closed write error.
    pub fn require(&self) -> Result<TenantId, IsolationError> {
        self.tenant_id().ok_or(IsolationError::NoTenantBound)
    }

    /// Rebind to another tenant (replaces any existing binding).
    pub fn rebind(&mut self, tenant_id: TenantId) {
        self.inner = Some(BoundTenant {
            tenant_id,
            bound_at: Utc::now(),
        });
    }

    /// Clear the binding. Mandatory at session end.
    pub fn clear(&mut self) {
        self.inner = None;
    }
}

impl Default for TenantContext {
    /// The default context is unbound - fail-closed by default.
    fn default() -> Self {
        Self::unbound()
    }
}

// ============================================================================
// TESTS
// ============================================================================
