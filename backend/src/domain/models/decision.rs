//! Finalized outcomes and reconciliation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::calculation::CalculationResult;
use super::period::{Month, Period};

/// The immutable snapshot produced when a case is finalized. Created once
/// per finalized outcome; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub case_id: String,
    pub active_period: Period,
    pub result: CalculationResult,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    /// Whether the identity registry had contact details, i.e. whether a
    /// notification artifact is owed downstream
    pub notification_owed: bool,
}

impl Decision {
    pub fn new(
        case_id: String,
        active_period: Period,
        result: CalculationResult,
        decided_by: String,
        notification_owed: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            case_id,
            active_period,
            result,
            decided_by,
            decided_at: Utc::now(),
            notification_owed,
        }
    }
}

/// One month where the engine's expectation and the ledger's dry run
/// disagree. Blocks finalization until resolved by a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub month: Month,
    /// Computed amount minus what the ledger already disbursed
    pub expected: i64,
    /// What the ledger's simulation projected
    pub simulated: i64,
}
