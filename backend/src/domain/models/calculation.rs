//! Calculation output model.
//!
//! A calculation is a pure function of basis data, rate table and the
//! evaluation instant; its result snapshots those inputs so the numbers
//! can be reproduced for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::basis::{ConsistencyIssue, DeductionCategory, Owner};
use super::period::{Month, Period};
use super::rate_table::RateCategory;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalculationError {
    #[error("No living situation covers {month}")]
    MissingLivingSituation { month: Month },
    #[error("No rate found for {category:?} at {month}")]
    RateNotFound { category: RateCategory, month: Month },
    #[error("Basis data is inconsistent ({} issue(s))", .issues.len())]
    InconsistentBasis { issues: Vec<ConsistencyIssue> },
}

/// Rounds to the nearest whole currency unit, half away from zero upward.
/// This is the single rounding rule of the engine; amounts ending in
/// exactly .50 round up.
pub fn round_half_up(amount: f64) -> i64 {
    (amount + 0.5).floor() as i64
}

/// A deduction that reduced one month's benefit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumedDeduction {
    pub basis_id: String,
    pub owner: Owner,
    pub category: DeductionCategory,
    pub amount: f64,
}

/// What one month resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthOutcome {
    Payable { amount: i64 },
    /// The computed amount fell below the minimum-payable threshold;
    /// nothing is paid for the month.
    RejectedBelowMinimum { computed: i64 },
}

impl MonthOutcome {
    pub fn payable_amount(&self) -> i64 {
        match self {
            MonthOutcome::Payable { amount } => *amount,
            MonthOutcome::RejectedBelowMinimum { .. } => 0,
        }
    }
}

/// The benefit computed for a single month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBenefit {
    pub month: Month,
    pub category: RateCategory,
    /// Unrounded monthly base rate used for the month
    pub monthly_rate: f64,
    pub deductions: Vec<ConsumedDeduction>,
    /// Partner-owned deduction entries excluded because no partner was
    /// recorded for the month
    pub excluded_basis_ids: Vec<String>,
    pub outcome: MonthOutcome,
}

/// Input snapshot carried by every result for reproducibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationInputs {
    pub active_period: Period,
    /// Ids of the live basis entries the calculation consumed, sorted
    pub basis_ids: Vec<String>,
    pub minimum_payable: i64,
    pub calculated_at: DateTime<Utc>,
}

/// A month amount pair as handed to the payment ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAmount {
    pub month: Month,
    pub amount: i64,
}

/// Carries no identity of its own: the result is a pure function of its
/// inputs, and two runs over the same inputs serialize byte-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub months: Vec<MonthlyBenefit>,
    pub inputs: CalculationInputs,
}

impl CalculationResult {
    pub fn new(months: Vec<MonthlyBenefit>, inputs: CalculationInputs) -> Self {
        Self { months, inputs }
    }

    pub fn total_amount(&self) -> i64 {
        self.months.iter().map(|m| m.outcome.payable_amount()).sum()
    }

    /// The per-month amounts in ledger form.
    pub fn monthly_amounts(&self) -> Vec<MonthlyAmount> {
        self.months
            .iter()
            .map(|m| MonthlyAmount { month: m.month, amount: m.outcome.payable_amount() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up_at_the_boundary() {
        assert_eq!(round_half_up(15_833.50), 15_834);
        assert_eq!(round_half_up(15_833.49), 15_833);
        assert_eq!(round_half_up(15_833.51), 15_834);
        assert_eq!(round_half_up(0.0), 0);
        assert_eq!(round_half_up(20_833.0), 20_833);
    }

    #[test]
    fn test_rejected_month_pays_nothing() {
        let outcome = MonthOutcome::RejectedBelowMinimum { computed: 37 };
        assert_eq!(outcome.payable_amount(), 0);
    }
}
