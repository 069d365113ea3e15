//! The monthly benefit calculation.
//!
//! For every month of the active period the engine resolves the living
//! situation, looks up the effective rate, subtracts the deductions that
//! apply to the month and rounds the result half-up to whole currency
//! units. The service is pure: identical basis data, rate table and
//! evaluation instant always produce an identical result, which is what
//! reconciliation and audit rely on.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::domain::consistency_service::ConsistencyService;
use crate::domain::models::basis::{
    live_entries, Basis, BasisKind, LivingArrangement, Owner,
};
use crate::domain::models::calculation::{
    round_half_up, CalculationError, CalculationInputs, CalculationResult, ConsumedDeduction,
    MonthOutcome, MonthlyBenefit,
};
use crate::domain::models::period::{Month, Period};
use crate::domain::models::rate_table::{RateCategory, RateProvider};

/// Calculation policy resolved once per operation and passed in at
/// construction; never read from ambient state mid-calculation.
#[derive(Debug, Clone, Copy)]
pub struct CalculationPolicy {
    /// Months computing below this amount are rejected instead of paid
    pub minimum_payable: i64,
}

impl Default for CalculationPolicy {
    fn default() -> Self {
        Self { minimum_payable: 0 }
    }
}

#[derive(Clone)]
pub struct CalculationService<R> {
    rates: R,
    policy: CalculationPolicy,
    consistency: ConsistencyService,
}

impl<R: RateProvider> CalculationService<R> {
    pub fn new(rates: R, policy: CalculationPolicy) -> Self {
        Self { rates, policy, consistency: ConsistencyService::new() }
    }

    /// Computes the benefit for every month of `active_period`.
    ///
    /// `calculated_at` is the evaluation instant and part of the input
    /// snapshot; callers pass it in so reruns can be byte-identical.
    pub fn calculate(
        &self,
        active_period: &Period,
        basis: &[Basis],
        calculated_at: DateTime<Utc>,
    ) -> Result<CalculationResult, CalculationError> {
        let issues = self.consistency.check(basis);
        if !issues.is_empty() {
            warn!("Refusing to calculate: {} consistency issue(s)", issues.len());
            return Err(CalculationError::InconsistentBasis { issues });
        }

        let live: Vec<&Basis> = live_entries(basis).collect();
        let mut months = Vec::with_capacity(active_period.month_count() as usize);
        for month in active_period.months() {
            months.push(self.calculate_month(month, &live)?);
        }

        let mut basis_ids: Vec<String> = live.iter().map(|b| b.id.clone()).collect();
        basis_ids.sort();

        let result = CalculationResult::new(
            months,
            CalculationInputs {
                active_period: *active_period,
                basis_ids,
                minimum_payable: self.policy.minimum_payable,
                calculated_at,
            },
        );
        info!(
            "Calculated {} month(s), total amount {}",
            result.months.len(),
            result.total_amount()
        );
        Ok(result)
    }

    fn calculate_month(
        &self,
        month: Month,
        live: &[&Basis],
    ) -> Result<MonthlyBenefit, CalculationError> {
        let arrangement = living_arrangement_for(live, month)
            .ok_or(CalculationError::MissingLivingSituation { month })?;
        let partner_present = arrangement == LivingArrangement::WithPartner;
        let category = RateCategory::for_arrangement(arrangement);

        let rate = self
            .rates
            .rate_for(category, month)
            .ok_or(CalculationError::RateNotFound { category, month })?;
        let monthly_rate = rate.monthly_rate();

        let mut deductions = Vec::new();
        let mut excluded_basis_ids = Vec::new();
        for basis in live {
            let BasisKind::Deduction { monthly_amount, category, owner } = basis.kind else {
                continue;
            };
            // Intersecting the declared period with the month keeps a
            // multi-month deduction from counting more than once.
            if !basis.period.contains_month(month) {
                continue;
            }
            if owner == Owner::Partner && !partner_present {
                warn!(
                    "Excluding partner deduction {} for {}: no partner recorded",
                    basis.id, month
                );
                excluded_basis_ids.push(basis.id.clone());
                continue;
            }
            deductions.push(ConsumedDeduction {
                basis_id: basis.id.clone(),
                owner,
                category,
                amount: monthly_amount,
            });
        }

        let total_deductions: f64 = deductions.iter().map(|d| d.amount).sum();
        let computed = round_half_up((monthly_rate - total_deductions).max(0.0));
        let outcome = if computed < self.policy.minimum_payable {
            MonthOutcome::RejectedBelowMinimum { computed }
        } else {
            MonthOutcome::Payable { amount: computed }
        };

        Ok(MonthlyBenefit {
            month,
            category,
            monthly_rate,
            deductions,
            excluded_basis_ids,
            outcome,
        })
    }
}

fn living_arrangement_for(live: &[&Basis], month: Month) -> Option<LivingArrangement> {
    live.iter().find_map(|b| match b.kind {
        BasisKind::LivingSituation { arrangement, .. } if b.period.contains_month(month) => {
            Some(arrangement)
        }
        _ => None,
    })
}
