//! Eligibility criteria and their assessment sub-periods.
//!
//! A criterion is assessed in sub-periods which together must tile the
//! case's active period exactly. The overall verdict is the worst verdict
//! found, with precedence Rejected > Unclear > Approved.

use serde::{Deserialize, Serialize};

use super::period::{Month, Period};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Sub-periods of {criterion:?} leave the active period uncovered at {missing:?}")]
    IncompleteCoverage {
        criterion: CriterionKind,
        missing: Vec<Period>,
    },
    #[error("Sub-periods of {criterion:?} overlap each other")]
    OverlappingSubPeriods { criterion: CriterionKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Approved,
    Rejected,
    Unclear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriterionKind {
    Disability,
    NetWorth,
    Residence,
    InstitutionStay,
}

/// A verdict for one slice of the active period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSubPeriod {
    pub period: Period,
    pub verdict: Verdict,
}

/// One eligibility condition and its per-sub-period assessments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub kind: CriterionKind,
    pub sub_periods: Vec<AssessmentSubPeriod>,
    /// Derived by [`Criterion::evaluate`]; `None` until evaluated
    pub overall: Option<Verdict>,
}

impl Criterion {
    pub fn new(kind: CriterionKind, sub_periods: Vec<AssessmentSubPeriod>) -> Self {
        Self { kind, sub_periods, overall: None }
    }

    /// Validates coverage against the active period and derives the overall
    /// verdict. The verdict is not computed when coverage fails.
    pub fn evaluate(&self, active_period: &Period) -> Result<Verdict, EvaluationError> {
        let mut covered: Vec<Month> = self
            .sub_periods
            .iter()
            .flat_map(|sp| sp.period.months())
            .collect();
        covered.sort();

        let before_dedup = covered.len();
        covered.dedup();
        if covered.len() != before_dedup {
            return Err(EvaluationError::OverlappingSubPeriods { criterion: self.kind });
        }

        let missing: Vec<Month> = active_period
            .months()
            .filter(|m| !covered.contains(m))
            .collect();
        let stray = covered.iter().any(|m| !active_period.contains_month(*m));
        if !missing.is_empty() || stray {
            return Err(EvaluationError::IncompleteCoverage {
                criterion: self.kind,
                missing: Period::from_months(&missing),
            });
        }

        let mut verdict = Verdict::Approved;
        for sub in &self.sub_periods {
            match sub.verdict {
                Verdict::Rejected => return Ok(Verdict::Rejected),
                Verdict::Unclear => verdict = Verdict::Unclear,
                Verdict::Approved => {}
            }
        }
        Ok(verdict)
    }
}
