//! Payment reconciliation against the external ledger.
//!
//! The engine's expectation for a month is the computed amount minus
//! whatever the ledger's history already disbursed for it. Before a case
//! may finalize, that expectation is compared month by month against a
//! dry-run simulation from the ledger; any mismatch blocks finalization
//! and is surfaced as a [`Discrepancy`] for human resolution. The engine
//! never overrides the ledger silently.

use std::sync::Arc;

use log::{info, warn};

use crate::domain::models::calculation::CalculationResult;
use crate::domain::models::decision::Discrepancy;
use crate::ledger::{LedgerError, PaymentLedger};

#[derive(Clone)]
pub struct ReconciliationService {
    ledger: Arc<dyn PaymentLedger>,
}

impl ReconciliationService {
    pub fn new(ledger: Arc<dyn PaymentLedger>) -> Self {
        Self { ledger }
    }

    /// Runs a fresh dry run and compares it to the expectation. Read-only
    /// and idempotent; safe to retry after `ExternalUnavailable`.
    pub fn reconcile(
        &self,
        case_id: &str,
        calculation: &CalculationResult,
    ) -> Result<Vec<Discrepancy>, LedgerError> {
        let amounts = calculation.monthly_amounts();
        let simulation = self.ledger.simulate(case_id, &amounts)?;
        let disbursed = self.ledger.disbursed(case_id)?;

        let mut discrepancies = Vec::new();
        for monthly in &amounts {
            let already = disbursed
                .iter()
                .find(|m| m.month == monthly.month)
                .map(|m| m.amount)
                .unwrap_or(0);
            let expected = monthly.amount - already;
            let simulated = simulation.projected_for(monthly.month);
            if expected != simulated {
                warn!(
                    "Discrepancy for case {} at {}: expected {}, ledger projects {}",
                    case_id, monthly.month, expected, simulated
                );
                discrepancies.push(Discrepancy { month: monthly.month, expected, simulated });
            }
        }

        if discrepancies.is_empty() {
            info!("Case {} reconciled cleanly over {} month(s)", case_id, amounts.len());
        }
        Ok(discrepancies)
    }
}
