//! The case aggregate and its state machine.
//!
//! A case moves Created → AssessedPending → Calculated → Simulated →
//! PendingApproval → Finalized, with PendingApproval also able to return
//! the case to assessment and most states able to close it. Every
//! operation is matched exhaustively over the state tag; an operation the
//! current state does not support fails with the concrete source and
//! target states so callers can render state-specific guidance.
//!
//! All mutation goes through the aggregate's own operations. The event
//! log is append-only and exposed only as a read-only slice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::basis::{Basis, ConsistencyIssue};
use super::calculation::{CalculationError, CalculationResult};
use super::criterion::{Criterion, CriterionKind, EvaluationError, Verdict};
use super::decision::Discrepancy;
use super::period::Period;
use crate::ledger::SimulationResult;

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

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaseError {
    #[error("Cannot move case from {from} to {to}")]
    InvalidTransition { from: CaseState, to: CaseState },
    #[error("Approver {actor} handled the case and cannot also approve it")]
    SameActorConflict { actor: String },
    #[error("Case is pending approval and cannot be closed")]
    CannotCloseWhilePendingApproval,
    #[error("Case is finalized and cannot be closed")]
    CannotCloseFinalized,
    #[error("Case is already closed")]
    CannotCloseAlreadyClosed,
    #[error("Criterion {kind:?} evaluated to {verdict:?}, calculation requires approval")]
    CriteriaNotSatisfied { kind: CriterionKind, verdict: Verdict },
    #[error("Basis data is inconsistent ({} issue(s))", .issues.len())]
    InconsistentBasis { issues: Vec<ConsistencyIssue> },
    #[error("Computed payments diverge from the ledger simulation in {} month(s)", .discrepancies.len())]
    UnreconciledPayment { discrepancies: Vec<Discrepancy> },
    #[error("Case was modified concurrently; re-read and retry")]
    ConcurrentModification,
    #[error("Case {0} not found")]
    NotFound(String),
    #[error("External payment ledger unavailable")]
    ExternalUnavailable,
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Calculation(#[from] CalculationError),
}

/// Entries of the case's append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaseEvent {
    StateChanged {
        from: CaseState,
        to: CaseState,
        actor: String,
        at: DateTime<Utc>,
    },
    DiscrepancyRaised {
        discrepancy: Discrepancy,
        at: DateTime<Utc>,
    },
    DecisionFinalized {
        decision_id: String,
        total_amount: i64,
        at: DateTime<Utc>,
    },
}

/// The root aggregate of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    id: String,
    applicant_id: String,
    active_period: Period,
    basis: Vec<Basis>,
    criteria: Vec<Criterion>,
    calculation: Option<CalculationResult>,
    simulation: Option<SimulationResult>,
    state: CaseState,
    version: u64,
    /// Identity that last worked the case before approval; used for the
    /// separation-of-duties check
    last_handled_by: Option<String>,
    created_at: DateTime<Utc>,
    events: Vec<CaseEvent>,
}

impl Case {
    pub fn new(applicant_id: String, active_period: Period, initial_basis: Vec<Basis>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            applicant_id,
            active_period,
            basis: initial_basis,
            criteria: Vec::new(),
            calculation: None,
            simulation: None,
            state: CaseState::Created,
            version: 0,
            last_handled_by: None,
            created_at: Utc::now(),
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn applicant_id(&self) -> &str {
        &self.applicant_id
    }

    pub fn active_period(&self) -> &Period {
        &self.active_period
    }

    pub fn state(&self) -> CaseState {
        self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn basis(&self) -> &[Basis] {
        &self.basis
    }

    pub fn live_basis(&self) -> Vec<&Basis> {
        self.basis.iter().filter(|b| !b.superseded).collect()
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn calculation(&self) -> Option<&CalculationResult> {
        self.calculation.as_ref()
    }

    pub fn simulation(&self) -> Option<&SimulationResult> {
        self.simulation.as_ref()
    }

    pub fn last_handled_by(&self) -> Option<&str> {
        self.last_handled_by.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Read-only snapshot of the append-only event log.
    pub fn events(&self) -> &[CaseEvent] {
        &self.events
    }

    fn transition(&mut self, to: CaseState, actor: &str) {
        self.events.push(CaseEvent::StateChanged {
            from: self.state,
            to,
            actor: actor.to_string(),
            at: Utc::now(),
        });
        self.state = to;
    }

    /// Records the assessed criteria. Allowed while the case is being
    /// worked; re-assessment replaces the previous criteria wholesale.
    pub fn submit_assessment(
        &mut self,
        actor: &str,
        criteria: Vec<Criterion>,
    ) -> Result<(), CaseError> {
        match self.state {
            CaseState::Created | CaseState::AssessedPending => {
                self.criteria = criteria;
                self.calculation = None;
                self.simulation = None;
                self.last_handled_by = Some(actor.to_string());
                self.transition(CaseState::AssessedPending, actor);
                Ok(())
            }
            from => Err(CaseError::InvalidTransition { from, to: CaseState::AssessedPending }),
        }
    }

    /// Appends new basis entries and marks the given prior entries
    /// superseded. Basis entries are never mutated in place. A revision
    /// after calculation or simulation re-opens assessment: the recorded
    /// numbers no longer reflect the data.
    pub fn revise_basis(
        &mut self,
        actor: &str,
        new_entries: Vec<Basis>,
        supersede_ids: &[String],
    ) -> Result<(), CaseError> {
        match self.state {
            CaseState::Created
            | CaseState::AssessedPending
            | CaseState::Calculated
            | CaseState::Simulated => {
                for entry in &mut self.basis {
                    if supersede_ids.contains(&entry.id) {
                        entry.superseded = true;
                    }
                }
                self.basis.extend(new_entries);
                self.calculation = None;
                self.simulation = None;
                self.last_handled_by = Some(actor.to_string());
                if matches!(self.state, CaseState::Calculated | CaseState::Simulated) {
                    self.transition(CaseState::AssessedPending, actor);
                }
                Ok(())
            }
            from => Err(CaseError::InvalidTransition { from, to: CaseState::AssessedPending }),
        }
    }

    pub fn record_calculation(
        &mut self,
        actor: &str,
        result: CalculationResult,
    ) -> Result<(), CaseError> {
        match self.state {
            CaseState::AssessedPending => {
                self.calculation = Some(result);
                self.simulation = None;
                self.last_handled_by = Some(actor.to_string());
                self.transition(CaseState::Calculated, actor);
                Ok(())
            }
            from => Err(CaseError::InvalidTransition { from, to: CaseState::Calculated }),
        }
    }

    pub fn record_simulation(
        &mut self,
        actor: &str,
        simulation: SimulationResult,
    ) -> Result<(), CaseError> {
        match self.state {
            CaseState::Calculated => {
                self.simulation = Some(simulation);
                self.last_handled_by = Some(actor.to_string());
                self.transition(CaseState::Simulated, actor);
                Ok(())
            }
            from => Err(CaseError::InvalidTransition { from, to: CaseState::Simulated }),
        }
    }

    pub fn send_to_approval(&mut self, actor: &str) -> Result<(), CaseError> {
        match self.state {
            CaseState::Simulated => {
                self.last_handled_by = Some(actor.to_string());
                self.transition(CaseState::PendingApproval, actor);
                Ok(())
            }
            from => Err(CaseError::InvalidTransition { from, to: CaseState::PendingApproval }),
        }
    }

    /// Checks that `approver` may finalize the case right now, without
    /// performing the transition. Reconciliation runs between this check
    /// and [`Case::finalize`].
    pub fn ensure_can_finalize(&self, approver: &str) -> Result<(), CaseError> {
        match self.state {
            CaseState::PendingApproval => {
                if self.last_handled_by.as_deref() == Some(approver) {
                    return Err(CaseError::SameActorConflict { actor: approver.to_string() });
                }
                Ok(())
            }
            from => Err(CaseError::InvalidTransition { from, to: CaseState::Finalized }),
        }
    }

    pub fn finalize(
        &mut self,
        approver: &str,
        decision_id: &str,
        total_amount: i64,
    ) -> Result<(), CaseError> {
        self.ensure_can_finalize(approver)?;
        self.transition(CaseState::Finalized, approver);
        self.events.push(CaseEvent::DecisionFinalized {
            decision_id: decision_id.to_string(),
            total_amount,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Re-opens assessment from approval. Always permitted while pending.
    pub fn return_to_assessment(&mut self, approver: &str) -> Result<(), CaseError> {
        match self.state {
            CaseState::PendingApproval => {
                self.transition(CaseState::AssessedPending, approver);
                Ok(())
            }
            from => Err(CaseError::InvalidTransition { from, to: CaseState::AssessedPending }),
        }
    }

    /// Drops the case back to Simulated after reconciliation found
    /// discrepancies, recording each of them in the event log.
    pub fn revert_to_simulated(
        &mut self,
        actor: &str,
        discrepancies: &[Discrepancy],
    ) -> Result<(), CaseError> {
        match self.state {
            CaseState::PendingApproval => {
                for discrepancy in discrepancies {
                    self.events.push(CaseEvent::DiscrepancyRaised {
                        discrepancy: *discrepancy,
                        at: Utc::now(),
                    });
                }
                self.transition(CaseState::Simulated, actor);
                Ok(())
            }
            from => Err(CaseError::InvalidTransition { from, to: CaseState::Simulated }),
        }
    }

    pub fn close(&mut self, actor: &str) -> Result<(), CaseError> {
        match self.state {
            CaseState::PendingApproval => Err(CaseError::CannotCloseWhilePendingApproval),
            CaseState::Finalized => Err(CaseError::CannotCloseFinalized),
            CaseState::Closed => Err(CaseError::CannotCloseAlreadyClosed),
            CaseState::Created
            | CaseState::AssessedPending
            | CaseState::Calculated
            | CaseState::Simulated => {
                self.transition(CaseState::Closed, actor);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::period::Month;

    fn test_case() -> Case {
        let period =
            Period::try_new(Month::new(2024, 1).unwrap(), Month::new(2024, 12).unwrap()).unwrap();
        Case::new("applicant-1".to_string(), period, Vec::new())
    }

    #[test]
    fn test_new_case_starts_in_created_at_version_zero() {
        let case = test_case();
        assert_eq!(case.state(), CaseState::Created);
        assert_eq!(case.version(), 0);
        assert!(case.events().is_empty());
    }

    #[test]
    fn test_calculate_before_assessment_names_both_states() {
        let mut case = test_case();
        let err = case
            .record_calculation("worker", dummy_calculation(&case))
            .unwrap_err();
        assert_eq!(
            err,
            CaseError::InvalidTransition {
                from: CaseState::Created,
                to: CaseState::Calculated,
            }
        );
        assert_eq!(case.state(), CaseState::Created);
    }

    #[test]
    fn test_close_rules() {
        let mut case = test_case();
        case.close("worker").unwrap();
        assert_eq!(case.state(), CaseState::Closed);
        assert_eq!(case.close("worker"), Err(CaseError::CannotCloseAlreadyClosed));
    }

    #[test]
    fn test_same_actor_cannot_approve() {
        let mut case = test_case();
        case.submit_assessment("worker", Vec::new()).unwrap();
        case.record_calculation("worker", dummy_calculation(&case)).unwrap();
        case.record_simulation("worker", dummy_simulation(&case)).unwrap();
        case.send_to_approval("worker").unwrap();

        assert_eq!(
            case.ensure_can_finalize("worker"),
            Err(CaseError::SameActorConflict { actor: "worker".to_string() })
        );
        assert!(case.ensure_can_finalize("approver").is_ok());
    }

    #[test]
    fn test_return_to_assessment_reopens_the_case() {
        let mut case = test_case();
        case.submit_assessment("worker", Vec::new()).unwrap();
        case.record_calculation("worker", dummy_calculation(&case)).unwrap();
        case.record_simulation("worker", dummy_simulation(&case)).unwrap();
        case.send_to_approval("worker").unwrap();

        case.return_to_assessment("approver").unwrap();
        assert_eq!(case.state(), CaseState::AssessedPending);
        // The whole path can be walked again.
        case.record_calculation("worker", dummy_calculation(&case)).unwrap();
    }

    #[test]
    fn test_revise_basis_after_calculation_reopens_assessment() {
        let mut case = test_case();
        case.submit_assessment("worker", Vec::new()).unwrap();
        case.record_calculation("worker", dummy_calculation(&case)).unwrap();
        assert!(case.calculation().is_some());

        case.revise_basis("worker", Vec::new(), &[]).unwrap();
        assert_eq!(case.state(), CaseState::AssessedPending);
        assert!(case.calculation().is_none());
        assert!(case.simulation().is_none());
    }

    #[test]
    fn test_revise_basis_rejected_while_pending_approval() {
        let mut case = test_case();
        case.submit_assessment("worker", Vec::new()).unwrap();
        case.record_calculation("worker", dummy_calculation(&case)).unwrap();
        case.record_simulation("worker", dummy_simulation(&case)).unwrap();
        case.send_to_approval("worker").unwrap();

        assert_eq!(
            case.revise_basis("worker", Vec::new(), &[]),
            Err(CaseError::InvalidTransition {
                from: CaseState::PendingApproval,
                to: CaseState::AssessedPending,
            })
        );
    }

    #[test]
    fn test_event_log_records_every_transition() {
        let mut case = test_case();
        case.submit_assessment("worker", Vec::new()).unwrap();
        case.record_calculation("worker", dummy_calculation(&case)).unwrap();

        let transitions: Vec<(CaseState, CaseState)> = case
            .events()
            .iter()
            .filter_map(|e| match e {
                CaseEvent::StateChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (CaseState::Created, CaseState::AssessedPending),
                (CaseState::AssessedPending, CaseState::Calculated),
            ]
        );
    }

    fn dummy_calculation(case: &Case) -> CalculationResult {
        use crate::domain::models::calculation::CalculationInputs;
        CalculationResult::new(
            Vec::new(),
            CalculationInputs {
                active_period: *case.active_period(),
                basis_ids: Vec::new(),
                minimum_payable: 0,
                calculated_at: Utc::now(),
            },
        )
    }

    fn dummy_simulation(case: &Case) -> SimulationResult {
        SimulationResult {
            case_id: case.id().to_string(),
            projected: Vec::new(),
            simulated_at: Utc::now(),
        }
    }
}
