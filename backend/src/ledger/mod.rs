//! Payment ledger port.
//!
//! The external ledger is the system of record that actually disburses
//! money. The engine only asks it for read-only dry runs and, once, for
//! the finalizing commit. Dry runs are idempotent and may be retried;
//! the commit carries a deduplication key so a retry after a network
//! ambiguity cannot double-book.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::domain::models::calculation::MonthlyAmount;
use crate::domain::models::decision::Decision;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Payment ledger did not answer within the deadline")]
    ExternalUnavailable,
}

/// Result of a dry-run simulation: what the ledger would pay out per month
/// if the given amounts were booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub case_id: String,
    pub projected: Vec<MonthlyAmount>,
    pub simulated_at: DateTime<Utc>,
}

impl SimulationResult {
    pub fn projected_for(&self, month: crate::domain::models::period::Month) -> i64 {
        self.projected
            .iter()
            .find(|m| m.month == month)
            .map(|m| m.amount)
            .unwrap_or(0)
    }
}

/// The engine's view of the external payment ledger.
pub trait PaymentLedger: Send + Sync {
    /// Read-only dry run; safe to retry.
    fn simulate(
        &self,
        case_id: &str,
        monthly_amounts: &[MonthlyAmount],
    ) -> Result<SimulationResult, LedgerError>;

    /// What the ledger has already disbursed for this case, per month.
    fn disbursed(&self, case_id: &str) -> Result<Vec<MonthlyAmount>, LedgerError>;

    /// Books the decision. `dedupe_key` must be derived from the case
    /// version so an ambiguous retry cannot book twice.
    fn commit(&self, case_id: &str, decision: &Decision, dedupe_key: &str)
        -> Result<(), LedgerError>;
}

/// In-process ledger used by the facade and the test suites.
///
/// Projects per month what a booking would pay on top of what is already
/// disbursed, floored at zero: the ledger never projects a negative
/// payout, which is exactly what makes historical overpayment surface as
/// a reconciliation discrepancy.
#[derive(Default)]
pub struct InMemoryLedger {
    disbursed: Mutex<HashMap<String, Vec<MonthlyAmount>>>,
    commits: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds prior disbursements, e.g. from an earlier decision.
    pub fn record_disbursed(&self, case_id: &str, amounts: Vec<MonthlyAmount>) {
        self.disbursed.lock().unwrap().insert(case_id.to_string(), amounts);
    }

    /// Makes every subsequent call fail with `ExternalUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn committed_decision(&self, dedupe_key: &str) -> Option<String> {
        self.commits.lock().unwrap().get(dedupe_key).cloned()
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::ExternalUnavailable);
        }
        Ok(())
    }
}

impl PaymentLedger for InMemoryLedger {
    fn simulate(
        &self,
        case_id: &str,
        monthly_amounts: &[MonthlyAmount],
    ) -> Result<SimulationResult, LedgerError> {
        self.check_available()?;
        let disbursed = self.disbursed.lock().unwrap();
        let prior = disbursed.get(case_id);
        let projected = monthly_amounts
            .iter()
            .map(|requested| {
                let already = prior
                    .and_then(|p| p.iter().find(|m| m.month == requested.month))
                    .map(|m| m.amount)
                    .unwrap_or(0);
                MonthlyAmount {
                    month: requested.month,
                    amount: (requested.amount - already).max(0),
                }
            })
            .collect();
        Ok(SimulationResult {
            case_id: case_id.to_string(),
            projected,
            simulated_at: Utc::now(),
        })
    }

    fn disbursed(&self, case_id: &str) -> Result<Vec<MonthlyAmount>, LedgerError> {
        self.check_available()?;
        Ok(self
            .disbursed
            .lock()
            .unwrap()
            .get(case_id)
            .cloned()
            .unwrap_or_default())
    }

    fn commit(
        &self,
        case_id: &str,
        decision: &Decision,
        dedupe_key: &str,
    ) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut commits = self.commits.lock().unwrap();
        // A replayed commit with the same key is a no-op.
        if commits.contains_key(dedupe_key) {
            return Ok(());
        }
        commits.insert(dedupe_key.to_string(), decision.id.clone());

        let mut disbursed = self.disbursed.lock().unwrap();
        let entry = disbursed.entry(case_id.to_string()).or_default();
        for amount in decision.result.monthly_amounts() {
            match entry.iter_mut().find(|m| m.month == amount.month) {
                Some(existing) => existing.amount += amount.amount,
                None => entry.push(amount),
            }
        }
        Ok(())
    }
}
