//! Recovery cases for historical overpayment.
//!
//! Opened when a reassessment reduces entitlement below what a prior
//! decision already disbursed. A much smaller state machine than the
//! benefit case: Received → UnderReview → Decided → Sent → Closed, with
//! annulment possible from any non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::calculation::MonthlyAmount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryState {
    Received,
    UnderReview,
    Decided,
    Sent,
    Closed,
    Annulled,
}

impl RecoveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecoveryState::Closed | RecoveryState::Annulled)
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryState::Received => "received",
            RecoveryState::UnderReview => "under_review",
            RecoveryState::Decided => "decided",
            RecoveryState::Sent => "sent",
            RecoveryState::Closed => "closed",
            RecoveryState::Annulled => "annulled",
        };
        write!(f, "{}", name)
    }
}

/// How the overpayment is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryOutcome {
    FullWaiver,
    PartialWaiver,
    Recover,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecoveryError {
    #[error("Cannot move recovery case from {from} to {to}")]
    InvalidTransition { from: RecoveryState, to: RecoveryState },
    #[error("Recovery case is in a terminal state and cannot be annulled")]
    CannotAnnulTerminal,
    #[error("Recovery case {0} not found")]
    NotFound(String),
    #[error("Recovery case was modified concurrently; re-read and retry")]
    ConcurrentModification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryCase {
    id: String,
    case_id: String,
    /// The months and amounts disbursed beyond the revised entitlement
    overpaid: Vec<MonthlyAmount>,
    state: RecoveryState,
    outcome: Option<RecoveryOutcome>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecoveryCase {
    pub fn new(case_id: String, overpaid: Vec<MonthlyAmount>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            case_id,
            overpaid,
            state: RecoveryState::Received,
            outcome: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn overpaid(&self) -> &[MonthlyAmount] {
        &self.overpaid
    }

    pub fn overpaid_total(&self) -> i64 {
        self.overpaid.iter().map(|m| m.amount).sum()
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn outcome(&self) -> Option<RecoveryOutcome> {
        self.outcome
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn transition(&mut self, to: RecoveryState) {
        self.state = to;
        self.updated_at = Utc::now();
    }

    pub fn start_review(&mut self) -> Result<(), RecoveryError> {
        match self.state {
            RecoveryState::Received => {
                self.transition(RecoveryState::UnderReview);
                Ok(())
            }
            from => Err(RecoveryError::InvalidTransition { from, to: RecoveryState::UnderReview }),
        }
    }

    pub fn decide(&mut self, outcome: RecoveryOutcome) -> Result<(), RecoveryError> {
        match self.state {
            RecoveryState::UnderReview => {
                self.outcome = Some(outcome);
                self.transition(RecoveryState::Decided);
                Ok(())
            }
            from => Err(RecoveryError::InvalidTransition { from, to: RecoveryState::Decided }),
        }
    }

    pub fn send(&mut self) -> Result<(), RecoveryError> {
        match self.state {
            RecoveryState::Decided => {
                self.transition(RecoveryState::Sent);
                Ok(())
            }
            from => Err(RecoveryError::InvalidTransition { from, to: RecoveryState::Sent }),
        }
    }

    pub fn close(&mut self) -> Result<(), RecoveryError> {
        match self.state {
            RecoveryState::Sent => {
                self.transition(RecoveryState::Closed);
                Ok(())
            }
            from => Err(RecoveryError::InvalidTransition { from, to: RecoveryState::Closed }),
        }
    }

    /// Permitted from every non-terminal state.
    pub fn annul(&mut self) -> Result<(), RecoveryError> {
        if self.state.is_terminal() {
            return Err(RecoveryError::CannotAnnulTerminal);
        }
        self.transition(RecoveryState::Annulled);
        Ok(())
    }
}
