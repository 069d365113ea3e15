//! Criterion evaluation over a case's assessed criteria.

use log::info;

use crate::domain::models::criterion::{Criterion, EvaluationError};
use crate::domain::models::period::Period;

#[derive(Clone, Default)]
pub struct CriterionService;

impl CriterionService {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates every criterion against the active period, filling in the
    /// derived overall verdicts. Fails on the first coverage violation;
    /// nothing is partially applied in that case.
    pub fn evaluate_all(
        &self,
        criteria: &[Criterion],
        active_period: &Period,
    ) -> Result<Vec<Criterion>, EvaluationError> {
        let mut evaluated = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            let verdict = criterion.evaluate(active_period)?;
            info!("Criterion {:?} evaluated to {:?}", criterion.kind, verdict);
            evaluated.push(Criterion { overall: Some(verdict), ..criterion.clone() });
        }
        Ok(evaluated)
    }
}
