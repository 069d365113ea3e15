use serde::{Deserialize, Serialize};
use std::fmt;

/// Case lifecycle state as exposed to downstream consumers.
///
/// Mirrors the backend state tags one to one so document generation and
/// audit logging can match on them without depending on the engine crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseState {
    Created,
    AssessedPending,
    Calculated,
    Simulated,
    PendingApproval,
    Finalized,
    Closed,
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaseState::Created => "created",
            CaseState::AssessedPending => "assessed_pending",
            CaseState::Calculated => "calculated",
            CaseState::Simulated => "simulated",
            CaseState::PendingApproval => "pending_approval",
            CaseState::Finalized => "finalized",
            CaseState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// A single month in `YYYY-MM` form, used by event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRef {
    pub year: i32,
    /// 1-12
    pub month: u32,
}

/// Notification that a case moved from one state to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStateChanged {
    pub case_id: String,
    pub from: CaseState,
    pub to: CaseState,
    /// Identity that triggered the transition
    pub actor: String,
    /// RFC 3339 timestamp
    pub occurred_at: String,
}

/// Notification that a decision was finalized for a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionFinalized {
    pub case_id: String,
    pub decision_id: String,
    /// Total benefit amount over the active period, whole currency units
    pub total_amount: i64,
    /// RFC 3339 timestamp
    pub occurred_at: String,
}

/// Notification that payment reconciliation found a mismatch for a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyRaised {
    pub case_id: String,
    pub month: MonthRef,
    /// What the engine expected the ledger to pay out
    pub expected: i64,
    /// What the ledger's dry run projected
    pub simulated: i64,
    /// RFC 3339 timestamp
    pub occurred_at: String,
}

/// Envelope for all outbound engine events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EngineEvent {
    CaseStateChanged(CaseStateChanged),
    DecisionFinalized(DecisionFinalized),
    DiscrepancyRaised(DiscrepancyRaised),
}

impl EngineEvent {
    pub fn case_id(&self) -> &str {
        match self {
            EngineEvent::CaseStateChanged(e) => &e.case_id,
            EngineEvent::DecisionFinalized(e) => &e.case_id,
            EngineEvent::DiscrepancyRaised(e) => &e.case_id,
        }
    }
}
