//! Enrichment job type for the work queue
//!
//! A job's claim carries an implicit lease: the lock timestamp. A
//! Processing job whose lock is older than the staleness threshold is
//! treated as abandoned and becomes claimable again.

use crate::{EventKey, JobId, JobStatus, TenantId, Timestamp};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A durable enrichment job ("compute embedding for event E").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedJob {
    pub job_id: JobId,
    pub tenant_id: TenantId,
    pub event_key: EventKey,
    pub status: JobStatus,
    pub attempts: u32,
    /// Worker currently holding the claim.
    pub locked_by: Option<String>,
    /// When the claim was taken; the implicit lease start.
    pub locked_at: Option<Timestamp>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EmbedJob {
    /// Create a pending job for an event.
    pub fn new(tenant_id: TenantId, event_key: EventKey) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::now_v7(),
            tenant_id,
            event_key,
            status: JobStatus::Pending,
            attempts: 0,
            locked_by: None,
            locked_at: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a Processing claim has outlived the staleness threshold.
    pub fn is_lock_stale(&self, now: Timestamp, staleness: Duration) -> bool {
        match (self.status, self.locked_at) {
            (JobStatus::Processing, Some(locked_at)) => now - locked_at >= staleness,
            _ => false,
        }
    }

    /// Whether a worker may claim this job right now: Pending, or
    /// Processing under an expired lease (abandoned by a dead worker).
    pub fn is_claimable(&self, now: Timestamp, staleness: Duration) -> bool {
        self.status == JobStatus::Pending || self.is_lock_stale(now, staleness)
    }

    /// Whether the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
