//! Decision records - durable accounts of agent choices
//!
//! One row per agent decision, linking a snapshot, a definitional entity,
//! and a reasoning trace. State machine: Pending -> { Completed, Failed };
//! a retryable failure re-arms Pending while attempts remain. Transitions
//! are timestamped and never reversed.

use crate::{DecisionStatus, EventKey, TaskId, TenantId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Opaque reasoning payload the agent supplies with its decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReasoning {
    /// Short human-readable summary.
    pub summary: String,
    /// Free-form trace (model output, tool calls, scores, ...).
    pub trace: Option<serde_json::Value>,
}

impl DecisionReasoning {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            trace: None,
        }
    }

    /// Attach the full trace.
    pub fn with_trace(mut self, trace: serde_json::Value) -> Self {
        self.trace = Some(trace);
        self
    }
}

/// A single logged state transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionTransition {
    pub from: DecisionStatus,
    pub to: DecisionStatus,
    pub at: Timestamp,
}

/// Durable record of an agent's chosen action and its justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub task_id: TaskId,
    pub tenant_id: TenantId,
    /// Snapshot the decision targeted (replayable membership).
    pub snapshot_id: String,
    /// Definitional entity the decision chose.
    pub event_key: EventKey,
    pub reasoning: DecisionReasoning,
    pub status: DecisionStatus,
    pub attempts: u32,
    pub outcome: Option<String>,
    pub error: Option<String>,
    pub transitions: Vec<DecisionTransition>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DecisionRecord {
    /// Create a pending decision record.
    pub fn new(
        task_id: TaskId,
        tenant_id: TenantId,
        snapshot_id: &str,
        event_key: EventKey,
        reasoning: DecisionReasoning,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            tenant_id,
            snapshot_id: snapshot_id.to_string(),
            event_key,
            reasoning,
            status: DecisionStatus::Pending,
            attempts: 0,
            outcome: None,
            error: None,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            DecisionStatus::Completed | DecisionStatus::Failed
        )
    }

    /// Apply a transition, logging it with a timestamp.
    /// Callers validate preconditions; this only records.
    pub(crate) fn transition(&mut self, to: DecisionStatus) {
        let now = Utc::now();
        self.transitions.push(DecisionTransition {
            from: self.status,
            to,
            at: now,
        });
        self.status = to;
        self.updated_at = now;
    }

    /// Mark completed with an outcome summary.
    pub fn complete(&mut self, outcome: &str) {
        self.outcome = Some(outcome.to_string());
        self.transition(DecisionStatus::Completed);
    }

    /// Mark failed terminally.
    pub fn fail(&mut self, error: &str) {
        self.error = Some(error.to_string());
        self.transition(DecisionStatus::Failed);
    }

    /// Count a retryable failure and re-arm Pending.
    /// The failure is still logged as a Pending->Failed->Pending pair so the
    /// transition history shows every attempt.
    pub fn rearm(&mut self, error: &str) {
        self.attempts += 1;
        self.error = Some(error.to_string());
        self.transition(DecisionStatus::Failed);
        self.transition(DecisionStatus::Pending);
    }
}

// ============================================================================
// TESTS
// ============================================================================
