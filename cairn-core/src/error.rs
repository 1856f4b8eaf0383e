//! Error types for CAIRN operations

use crate::enums::ChannelParseError;
use crate::{EntityKind, JobId, TaskId, TenantId};
use thiserror::Error;
use uuid::Uuid;

/// Isolation-context errors. These are programmer errors: a write reached
/// the storage layer without a valid tenant binding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IsolationError {
    #[error("No tenant bound to the session context")]
    NoTenantBound,

    #[error("Tenant not found: {tenant_id}")]
    TenantNotFound { tenant_id: TenantId },

    #[error("Tenant {tenant_id} is not active ({status})")]
    TenantNotActive { tenant_id: TenantId, status: String },

    #[error("Entity tenant {entity_tenant} does not match bound tenant {bound_tenant}")]
    TenantMismatch {
        bound_tenant: TenantId,
        entity_tenant: TenantId,
    },
}

/// Identity catalog errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Entity not found: {kind:?} with key {key}")]
    NotFound { kind: EntityKind, key: String },

    #[error("Duplicate identity for {kind:?}: {key}")]
    DuplicateIdentity { kind: EntityKind, key: String },

    #[error("Malformed {channel} contact point '{value}': {reason}")]
    MalformedContactPoint {
        channel: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported channel: {0}")]
    UnknownChannel(String),
}

impl From<ChannelParseError> for CatalogError {
    fn from(err: ChannelParseError) -> Self {
        CatalogError::UnknownChannel(err.0)
    }
}

/// Append-only ledger errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Delivery attempt not found: {delivery_id}")]
    DeliveryNotFound { delivery_id: Uuid },
}

/// Snapshot engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Snapshot {snapshot_id} is immutable; {operation} is not permitted")]
    ImmutableSnapshot {
        snapshot_id: String,
        operation: String,
    },

    #[error("Snapshot not found: {snapshot_id}")]
    NotFound { snapshot_id: String },
}

/// Decision record store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("Decision record not found: {task_id}")]
    NotFound { task_id: TaskId },

    #[error("Decision record already exists: {task_id}")]
    Duplicate { task_id: TaskId },

    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: String,
        to: String,
    },

    #[error("Retries exhausted for task {task_id} after {attempts} attempts")]
    RetryExhausted { task_id: TaskId, attempts: u32 },
}

/// Work-queue errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: JobId },

    #[error("Job {job_id} is not processing (status {status})")]
    NotProcessing { job_id: JobId, status: String },

    #[error("Retries exhausted for job {job_id} after {attempts} attempts")]
    RetryExhausted { job_id: JobId, attempts: u32 },
}

/// Storage-internal errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all CAIRN errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CairnError {
    #[error("Isolation error: {0}")]
    Isolation(#[from] IsolationError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ChannelParseError> for CairnError {
    fn from(err: ChannelParseError) -> Self {
        CairnError::Catalog(err.into())
    }
}

/// Result type alias for CAIRN operations.
pub type CairnResult<T> = Result<T, CairnError>;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_error_display() {
        let err = IsolationError::NoTenantBound;
        assert!(format!("{}", err).contains("No tenant bound"));

        let err = IsolationError::TenantNotFound {
            tenant_id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Tenant not found"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_snapshot_error_display() {
        let err = SnapshotError::ImmutableSnapshot {
            snapshot_id: "SNAP_1".to_string(),
            operation: "delete".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("SNAP_1"));
        assert!(msg.contains("immutable"));
        assert!(msg.contains("delete"));
    }

    #[test]
    fn test_catalog_error_display_malformed_contact() {
        let err = CatalogError::MalformedContactPoint {
            channel: "email".to_string(),
            value: "not-an-address".to_string(),
            reason: "missing @".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("email"));
        assert!(msg.contains("not-an-address"));
        assert!(msg.contains("missing @"));
    }

    #[test]
    fn test_cairn_error_from_variants() {
        let isolation = CairnError::from(IsolationError::NoTenantBound);
        assert!(matches!(isolation, CairnError::Isolation(_)));

        let catalog = CairnError::from(CatalogError::UnknownChannel("x".to_string()));
        assert!(matches!(catalog, CairnError::Catalog(_)));

        let snapshot = CairnError::from(SnapshotError::NotFound {
            snapshot_id: "S".to_string(),
        });
        assert!(matches!(snapshot, CairnError::Snapshot(_)));

        let decision = CairnError::from(DecisionError::NotFound {
            task_id: Uuid::nil(),
        });
        assert!(matches!(decision, CairnError::Decision(_)));

        let queue = CairnError::from(QueueError::JobNotFound {
            job_id: Uuid::nil(),
        });
        assert!(matches!(queue, CairnError::Queue(_)));

        let storage = CairnError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, CairnError::Storage(_)));
    }

    #[test]
    fn test_channel_parse_error_converts() {
        let err = ChannelParseError("carrier_pigeon".to_string());
        let catalog: CatalogError = err.clone().into();
        assert!(matches!(catalog, CatalogError::UnknownChannel(ref c) if c == "carrier_pigeon"));
        let master: CairnError = err.into();
        assert!(matches!(master, CairnError::Catalog(_)));
    }

    #[test]
    fn test_retry_exhausted_display() {
        let err = QueueError::RetryExhausted {
            job_id: Uuid::nil(),
            attempts: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("exhausted"));
        assert!(msg.contains('3'));
    }
}
