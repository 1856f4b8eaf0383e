//! Engine configuration

use crate::{CairnResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Master configuration for the CAIRN engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CairnConfig {
    /// Age after which a Processing job's claim is considered abandoned.
    pub job_staleness: Duration,
    /// Attempt ceiling before a job fails terminally.
    pub max_job_attempts: u32,
    /// Attempt ceiling before a retryable decision fails terminally.
    pub max_decision_attempts: u32,
    /// Fan-out of the behavioral-event partitioning by tenant hash.
    pub ledger_tenant_buckets: u32,
}

impl Default for CairnConfig {
    fn default() -> Self {
        Self {
            job_staleness: Duration::from_secs(300),
            max_job_attempts: 3,
            max_decision_attempts: 3,
            ledger_tenant_buckets: 16,
        }
    }
}

impl CairnConfig {
    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(CairnError::Config) if invalid.
    pub fn validate(&self) -> CairnResult<()> {
        if self.job_staleness.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "job_staleness".to_string(),
                value: format!("{:?}", self.job_staleness),
                reason: "job_staleness must be positive".to_string(),
            }
            .into());
        }

        if self.max_job_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_job_attempts".to_string(),
                value: self.max_job_attempts.to_string(),
                reason: "max_job_attempts must be at least 1".to_string(),
            }
            .into());
        }

        if self.max_decision_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_decision_attempts".to_string(),
                value: self.max_decision_attempts.to_string(),
                reason: "max_decision_attempts must be at least 1".to_string(),
            }
            .into());
        }

        if self.ledger_tenant_buckets == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ledger_tenant_buckets".to_string(),
                value: self.ledger_tenant_buckets.to_string(),
                reason: "ledger_tenant_buckets must be at least 1".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// The staleness threshold as a chrono duration for timestamp math.
    pub fn job_staleness_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.job_staleness)
            .unwrap_or_else(|_| chrono::Duration::seconds(300))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CairnError;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CairnConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_staleness_rejected() {
        let config = CairnConfig {
            job_staleness: Duration::ZERO,
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(
            result,
            Err(CairnError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "job_staleness"
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = CairnConfig {
            max_job_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CairnConfig {
            max_decision_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_buckets_rejected() {
        let config = CairnConfig {
            ledger_tenant_buckets: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
