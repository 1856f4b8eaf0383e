//! Work queue - lease-based enrichment job dispatch
//!
//! A durable queue of embedding jobs consumed by independent workers that
//! share no memory and coordinate only through this table. The claim is a
//! single atomic find-and-mark pass under the table's write lock (no
//! check-then-act window): it selects one Pending job - or a Processing
//! job whose lease has gone stale - marks it Processing for the claiming
//! worker, and skips jobs held by live workers rather than waiting on
//! them. Contention resolves by skip-on-conflict, so throughput degrades
//! gracefully as worker counts grow.
//!
//! Delivery is at-least-once: a job abandoned by a crashed worker becomes
//! claimable again after the staleness threshold, so downstream enrichment
//! must be idempotent.

use cairn_core::{
    CairnConfig, CairnResult, EmbedJob, EventKey, JobId, JobStatus, QueueError, StorageError,
    TenantId,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// The enrichment work queue. Cross-tenant: workers drain all tenants,
/// and every job carries its own tenant id.
pub struct WorkQueue {
    staleness: chrono::Duration,
    max_attempts: u32,
    // Claims drain the oldest eligible job first, ordered by creation
    // time with the job id as tiebreaker.
    jobs: Arc<RwLock<BTreeMap<JobId, EmbedJob>>>,
}

impl WorkQueue {
    pub fn new(config: &CairnConfig) -> Self {
        Self {
            staleness: config.job_staleness_chrono(),
            max_attempts: config.max_job_attempts,
            jobs: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Enqueue an enrichment job for an event.
    ///
    /// Called by the catalog's write hook whenever embeddable content
    /// changes. If a Pending job for the same (tenant, event) already
    /// exists it is returned unchanged - the pending job will embed the
    /// latest content anyway. A Processing job does not suppress a new
    /// enqueue: the in-flight worker may be embedding stale content.
    pub fn enqueue(&self, tenant_id: TenantId, event_key: EventKey) -> CairnResult<EmbedJob> {
        let mut jobs = self.write()?;
        if let Some(existing) = jobs
            .values()
            .find(|j| {
                j.tenant_id == tenant_id
                    && j.event_key == event_key
                    && j.status == JobStatus::Pending
            })
            .cloned()
        {
            debug!(job_id = %existing.job_id, event_key = %event_key, "enqueue coalesced into pending job");
            return Ok(existing);
        }
        let job = EmbedJob::new(tenant_id, event_key);
        debug!(job_id = %job.job_id, tenant_id = %tenant_id, event_key = %event_key, "embed job enqueued");
        jobs.insert(job.job_id, job.clone());
        Ok(job)
    }

    /// Atomically claim the next eligible job for a worker.
    ///
    /// One pass under the write lock: the first Pending job, or the first
    /// Processing job whose lease is older than the staleness threshold
    /// (abandoned by a dead worker), is marked Processing with this
    /// worker's identity and the current time. Jobs locked by live workers
    /// are skipped, never waited on. Returns `None` when nothing is
    /// claimable.
    pub fn claim_next(&self, worker_id: &str) -> CairnResult<Option<EmbedJob>> {
        let now = Utc::now();
        let mut jobs = self.write()?;
        let Some(job) = jobs
            .values_mut()
            .filter(|j| j.is_claimable(now, self.staleness))
            .min_by_key(|j| (j.created_at, j.job_id))
        else {
            return Ok(None);
        };
        if job.is_lock_stale(now, self.staleness) {
            warn!(
                job_id = %job.job_id,
                abandoned_by = job.locked_by.as_deref().unwrap_or("unknown"),
                claimed_by = worker_id,
                "stale lease reclaimed"
            );
        }
        job.status = JobStatus::Processing;
        job.locked_by = Some(worker_id.to_string());
        job.locked_at = Some(now);
        job.updated_at = now;
        debug!(job_id = %job.job_id, worker_id, "job claimed");
        Ok(Some(job.clone()))
    }

    /// Mark a claimed job completed.
    pub fn complete(&self, job_id: JobId) -> CairnResult<EmbedJob> {
        let mut jobs = self.write()?;
        let job = jobs
            .get_mut(&job_id)
            .ok_or(QueueError::JobNotFound { job_id })?;
        if job.status != JobStatus::Processing {
            return Err(QueueError::NotProcessing {
                job_id,
                status: format!("{:?}", job.status),
            }
            .into());
        }
        job.status = JobStatus::Completed;
        job.locked_by = None;
        job.locked_at = None;
        job.updated_at = Utc::now();
        debug!(job_id = %job_id, "job completed");
        Ok(job.clone())
    }

    /// Mark a claimed job failed.
    ///
    /// Increments the attempt counter and returns the job to Pending while
    /// attempts remain; at the ceiling the job is durably marked Failed and
    /// the exhaustion is surfaced as an error.
    pub fn fail(&self, job_id: JobId, error: &str) -> CairnResult<EmbedJob> {
        let mut jobs = self.write()?;
        let job = jobs
            .get_mut(&job_id)
            .ok_or(QueueError::JobNotFound { job_id })?;
        if job.status != JobStatus::Processing {
            return Err(QueueError::NotProcessing {
                job_id,
                status: format!("{:?}", job.status),
            }
            .into());
        }
        job.attempts += 1;
        job.error = Some(error.to_string());
        job.locked_by = None;
        job.locked_at = None;
        job.updated_at = Utc::now();

        if job.attempts >= self.max_attempts {
            job.status = JobStatus::Failed;
            warn!(job_id = %job_id, attempts = job.attempts, "job retries exhausted");
            return Err(QueueError::RetryExhausted {
                job_id,
                attempts: job.attempts,
            }
            .into());
        }

        job.status = JobStatus::Pending;
        debug!(job_id = %job_id, attempts = job.attempts, "job returned to pending");
        Ok(job.clone())
    }

    /// Get a job by id.
    pub fn get(&self, job_id: JobId) -> CairnResult<Option<EmbedJob>> {
        Ok(self.read()?.get(&job_id).cloned())
    }

    /// Jobs in a status, oldest first.
    pub fn list_by_status(&self, status: JobStatus) -> CairnResult<Vec<EmbedJob>> {
        Ok(self
            .read()?
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect())
    }

    /// Number of claimable-right-now jobs.
    pub fn pending_count(&self) -> CairnResult<usize> {
        Ok(self
            .read()?
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .count())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<JobId, EmbedJob>>, StorageError> {
        self.jobs.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<JobId, EmbedJob>>, StorageError> {
        self.jobs.write().map_err(|_| StorageError::LockPoisoned)
    }
}

impl crate::catalog::CatalogObserver for WorkQueue {
    /// The catalog's write hook: an embeddable-content change schedules
    /// enrichment. A poisoned queue lock is logged, not propagated - the
    /// catalog write itself has already committed.
    fn embeddable_content_changed(&self, tenant_id: TenantId, event_key: EventKey) {
        if let Err(err) = self.enqueue(tenant_id, event_key) {
            warn!(tenant_id = %tenant_id, event_key = %event_key, %err, "embed enqueue failed");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
