//! Case orchestration: the state machine driven end to end.
//!
//! Every operation follows the same shape: load the case and the version
//! it was read at, run the aggregate transition, save against that
//! version. A version mismatch on save means another operation won the
//! race; the caller re-reads and retries the whole operation.
//!
//! Approval is the one composite operation: it re-checks basis
//! consistency, verifies separation of duties, reconciles against the
//! ledger, commits the decision with a version-derived deduplication key
//! and only then finalizes. A reconciliation discrepancy drops the case
//! back to Simulated with the discrepancies on the event log.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use crate::domain::commands::case::{
    ApproveCommand, ApproveResult, CalculateCommand, CalculateResult, CloseCaseCommand,
    ReconcileCommand, ReconcileResult, RegisterApplicationCommand, RegisterApplicationResult,
    ReturnToAssessmentCommand, ReviseBasisCommand, SendToApprovalCommand, SimulateCommand,
    SubmitAssessmentCommand, TransitionResult,
};
use crate::domain::calculation_service::{CalculationPolicy, CalculationService};
use crate::domain::consistency_service::ConsistencyService;
use crate::domain::criterion_service::CriterionService;
use crate::domain::models::calculation::CalculationError;
use crate::domain::models::case::{Case, CaseError, CaseState};
use crate::domain::models::criterion::Verdict;
use crate::domain::models::decision::Decision;
use crate::domain::models::rate_table::RateProvider;
use crate::domain::reconciliation_service::ReconciliationService;
use crate::ledger::{LedgerError, PaymentLedger};
use crate::registry::PersonRegistry;
use crate::storage::{CaseStorage, Connection, DecisionStorage, StorageError};

impl From<StorageError> for CaseError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConcurrentModification { .. } => CaseError::ConcurrentModification,
            StorageError::NotFound(id) => CaseError::NotFound(id),
            // A fresh UUID colliding with a stored aggregate means the
            // store saw a write we did not.
            StorageError::AlreadyExists(_) => CaseError::ConcurrentModification,
        }
    }
}

impl From<LedgerError> for CaseError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ExternalUnavailable => CaseError::ExternalUnavailable,
        }
    }
}

pub struct CaseService<C: Connection> {
    case_repository: C::CaseRepository,
    decision_repository: C::DecisionRepository,
    criteria: CriterionService,
    consistency: ConsistencyService,
    calculation: CalculationService<Arc<dyn RateProvider>>,
    reconciliation: ReconciliationService,
    ledger: Arc<dyn PaymentLedger>,
    registry: Arc<dyn PersonRegistry>,
}

impl<C: Connection> CaseService<C> {
    pub fn new(
        connection: &C,
        rates: Arc<dyn RateProvider>,
        policy: CalculationPolicy,
        ledger: Arc<dyn PaymentLedger>,
        registry: Arc<dyn PersonRegistry>,
    ) -> Self {
        Self {
            case_repository: connection.create_case_repository(),
            decision_repository: connection.create_decision_repository(),
            criteria: CriterionService::new(),
            consistency: ConsistencyService::new(),
            calculation: CalculationService::new(rates, policy),
            reconciliation: ReconciliationService::new(ledger.clone()),
            ledger,
            registry,
        }
    }

    pub fn register_application(
        &self,
        command: RegisterApplicationCommand,
    ) -> Result<RegisterApplicationResult, CaseError> {
        let case = Case::new(command.applicant_id, command.active_period, command.initial_basis);
        self.case_repository.store_new(&case)?;
        info!("Registered case {} for applicant {}", case.id(), case.applicant_id());
        Ok(RegisterApplicationResult { case_id: case.id().to_string(), version: case.version() })
    }

    pub fn get_case(&self, case_id: &str) -> Result<(Case, u64), CaseError> {
        Ok(self.case_repository.load(case_id)?)
    }

    pub fn submit_assessment(
        &self,
        command: SubmitAssessmentCommand,
    ) -> Result<TransitionResult, CaseError> {
        let (mut case, read_version) = self.case_repository.load(&command.case_id)?;
        let evaluated = self.criteria.evaluate_all(&command.criteria, case.active_period())?;
        case.submit_assessment(&command.actor, evaluated)?;
        let version = self.case_repository.save(&mut case, read_version)?;
        info!("Case {} assessed by {}", case.id(), command.actor);
        Ok(TransitionResult { state: case.state(), version })
    }

    pub fn revise_basis(&self, command: ReviseBasisCommand) -> Result<TransitionResult, CaseError> {
        let (mut case, read_version) = self.case_repository.load(&command.case_id)?;
        case.revise_basis(&command.actor, command.new_entries, &command.supersede_ids)?;
        let version = self.case_repository.save(&mut case, read_version)?;
        info!("Case {} basis revised by {}", case.id(), command.actor);
        Ok(TransitionResult { state: case.state(), version })
    }

    /// Runs the monthly calculation and records it on the case. Requires
    /// every criterion to have an approved overall verdict.
    pub fn calculate(&self, command: CalculateCommand) -> Result<CalculateResult, CaseError> {
        let (mut case, read_version) = self.case_repository.load(&command.case_id)?;
        if case.state() != CaseState::AssessedPending {
            return Err(CaseError::InvalidTransition {
                from: case.state(),
                to: CaseState::Calculated,
            });
        }
        for criterion in case.criteria() {
            let verdict = criterion.overall.unwrap_or(Verdict::Unclear);
            if verdict != Verdict::Approved {
                return Err(CaseError::CriteriaNotSatisfied { kind: criterion.kind, verdict });
            }
        }

        let result = self
            .calculation
            .calculate(case.active_period(), case.basis(), Utc::now())
            .map_err(|err| match err {
                CalculationError::InconsistentBasis { issues } => {
                    CaseError::InconsistentBasis { issues }
                }
                other => CaseError::Calculation(other),
            })?;

        case.record_calculation(&command.actor, result.clone())?;
        let version = self.case_repository.save(&mut case, read_version)?;
        info!(
            "Case {} calculated, total amount {}",
            case.id(),
            result.total_amount()
        );
        Ok(CalculateResult { calculation: result, version })
    }

    /// Asks the ledger for a dry run of the recorded calculation and
    /// stores the projection on the case.
    pub fn simulate(&self, command: SimulateCommand) -> Result<TransitionResult, CaseError> {
        let (mut case, read_version) = self.case_repository.load(&command.case_id)?;
        let calculation = match case.calculation() {
            Some(calculation) => calculation.clone(),
            None => {
                return Err(CaseError::InvalidTransition {
                    from: case.state(),
                    to: CaseState::Simulated,
                })
            }
        };
        let simulation = self.ledger.simulate(case.id(), &calculation.monthly_amounts())?;
        case.record_simulation(&command.actor, simulation)?;
        let version = self.case_repository.save(&mut case, read_version)?;
        Ok(TransitionResult { state: case.state(), version })
    }

    pub fn send_to_approval(
        &self,
        command: SendToApprovalCommand,
    ) -> Result<TransitionResult, CaseError> {
        let (mut case, read_version) = self.case_repository.load(&command.case_id)?;
        case.send_to_approval(&command.actor)?;
        let version = self.case_repository.save(&mut case, read_version)?;
        info!("Case {} sent to approval by {}", case.id(), command.actor);
        Ok(TransitionResult { state: case.state(), version })
    }

    /// Finalizes the case: separation-of-duties check, consistency
    /// re-check, reconciliation, ledger commit, then the transition. If
    /// reconciliation finds discrepancies the case is saved back in
    /// Simulated and the operation fails; if the ledger is unreachable
    /// nothing is changed and the operation can be retried as-is.
    pub fn approve(&self, command: ApproveCommand) -> Result<ApproveResult, CaseError> {
        let (mut case, read_version) = self.case_repository.load(&command.case_id)?;
        case.ensure_can_finalize(&command.approver)?;

        let issues = self.consistency.check(case.basis());
        if !issues.is_empty() {
            return Err(CaseError::InconsistentBasis { issues });
        }
        let calculation = match case.calculation() {
            Some(calculation) => calculation.clone(),
            None => {
                return Err(CaseError::InvalidTransition {
                    from: case.state(),
                    to: CaseState::Finalized,
                })
            }
        };

        let discrepancies = self.reconciliation.reconcile(case.id(), &calculation)?;
        if !discrepancies.is_empty() {
            warn!(
                "Case {} failed reconciliation with {} discrepancy(ies); returning to simulated",
                case.id(),
                discrepancies.len()
            );
            case.revert_to_simulated(&command.approver, &discrepancies)?;
            self.case_repository.save(&mut case, read_version)?;
            return Err(CaseError::UnreconciledPayment { discrepancies });
        }

        let notification_owed = self.registry.contact_info_for(case.applicant_id()).is_some();
        if !notification_owed {
            warn!(
                "No contact details for applicant {}; finalizing without notification",
                case.applicant_id()
            );
        }
        let decision = Decision::new(
            case.id().to_string(),
            *case.active_period(),
            calculation,
            command.approver.clone(),
            notification_owed,
        );

        // Keyed on the version we read so an ambiguous retry of this very
        // operation cannot book the payment twice.
        let dedupe_key = format!("{}:v{}", case.id(), read_version);
        self.ledger.commit(case.id(), &decision, &dedupe_key)?;

        case.finalize(&command.approver, &decision.id, decision.result.total_amount())?;
        let version = self.case_repository.save(&mut case, read_version)?;
        self.decision_repository.store_decision(&decision)?;
        info!(
            "Case {} finalized by {}, decision {}, total {}",
            case.id(),
            command.approver,
            decision.id,
            decision.result.total_amount()
        );
        Ok(ApproveResult { decision, version })
    }

    pub fn return_to_assessment(
        &self,
        command: ReturnToAssessmentCommand,
    ) -> Result<TransitionResult, CaseError> {
        let (mut case, read_version) = self.case_repository.load(&command.case_id)?;
        case.return_to_assessment(&command.approver)?;
        let version = self.case_repository.save(&mut case, read_version)?;
        info!("Case {} returned to assessment by {}", case.id(), command.approver);
        Ok(TransitionResult { state: case.state(), version })
    }

    pub fn close(&self, command: CloseCaseCommand) -> Result<TransitionResult, CaseError> {
        let (mut case, read_version) = self.case_repository.load(&command.case_id)?;
        case.close(&command.actor)?;
        let version = self.case_repository.save(&mut case, read_version)?;
        info!("Case {} closed by {}", case.id(), command.actor);
        Ok(TransitionResult { state: case.state(), version })
    }

    /// Standalone reconciliation report. Read-only; the case is not
    /// touched regardless of the outcome.
    pub fn reconcile(&self, command: ReconcileCommand) -> Result<ReconcileResult, CaseError> {
        let (case, _) = self.case_repository.load(&command.case_id)?;
        let calculation = match case.calculation() {
            Some(calculation) => calculation,
            None => {
                return Err(CaseError::InvalidTransition {
                    from: case.state(),
                    to: CaseState::Simulated,
                })
            }
        };
        let discrepancies = self.reconciliation.reconcile(case.id(), calculation)?;
        Ok(ReconcileResult { discrepancies })
    }

    pub fn decisions_for_case(&self, case_id: &str) -> Result<Vec<Decision>, CaseError> {
        Ok(self.decision_repository.decisions_for_case(case_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::basis::{Basis, DeductionCategory, LivingArrangement, Owner};
    use crate::domain::models::calculation::MonthlyAmount;
    use crate::domain::models::criterion::{
        AssessmentSubPeriod, Criterion, CriterionKind, Verdict,
    };
    use crate::domain::models::period::{Month, Period};
    use crate::domain::models::rate_table::{
        RateCategory, RateEntry, RateProvider, RateTable, StaticRateProvider,
    };
    use crate::ledger::InMemoryLedger;
    use crate::registry::{ContactInfo, StaticPersonRegistry};
    use crate::storage::MemoryConnection;

    fn month(m: u32) -> Month {
        Month::new(2024, m).unwrap()
    }

    fn full_year() -> Period {
        Period::try_new(month(1), month(12)).unwrap()
    }

    fn rates() -> Arc<dyn RateProvider> {
        let table = RateTable::try_new(vec![
            RateEntry {
                category: RateCategory::High,
                effective: full_year(),
                annual_rate: 249_996.0,
            },
            RateEntry {
                category: RateCategory::Ordinary,
                effective: full_year(),
                annual_rate: 228_000.0,
            },
        ])
        .unwrap();
        Arc::new(StaticRateProvider::new(table))
    }

    struct Fixture {
        service: CaseService<MemoryConnection>,
        ledger: Arc<InMemoryLedger>,
    }

    fn fixture() -> Fixture {
        let connection = MemoryConnection::new();
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = StaticPersonRegistry::new().with_contact(
            "applicant-1",
            ContactInfo {
                name: "Kari Nordmann".to_string(),
                address: Some("Storgata 1".to_string()),
                email: None,
            },
        );
        let service = CaseService::new(
            &connection,
            rates(),
            CalculationPolicy::default(),
            ledger.clone(),
            Arc::new(registry),
        );
        Fixture { service, ledger }
    }

    fn standard_basis() -> Vec<Basis> {
        vec![
            Basis::new_living_situation(full_year(), LivingArrangement::Alone, None),
            Basis::new_deduction(
                full_year(),
                5_000.0,
                DeductionCategory::EmploymentIncome,
                Owner::Applicant,
            )
            .unwrap(),
        ]
    }

    fn approved_criteria() -> Vec<Criterion> {
        vec![Criterion::new(
            CriterionKind::Disability,
            vec![AssessmentSubPeriod { period: full_year(), verdict: Verdict::Approved }],
        )]
    }

    fn registered_case(fixture: &Fixture) -> String {
        fixture
            .service
            .register_application(RegisterApplicationCommand {
                applicant_id: "applicant-1".to_string(),
                active_period: full_year(),
                initial_basis: standard_basis(),
            })
            .unwrap()
            .case_id
    }

    fn walk_to_pending_approval(fixture: &Fixture, case_id: &str) {
        fixture
            .service
            .submit_assessment(SubmitAssessmentCommand {
                case_id: case_id.to_string(),
                actor: "worker".to_string(),
                criteria: approved_criteria(),
            })
            .unwrap();
        fixture
            .service
            .calculate(CalculateCommand {
                case_id: case_id.to_string(),
                actor: "worker".to_string(),
            })
            .unwrap();
        fixture
            .service
            .simulate(SimulateCommand {
                case_id: case_id.to_string(),
                actor: "worker".to_string(),
            })
            .unwrap();
        fixture
            .service
            .send_to_approval(SendToApprovalCommand {
                case_id: case_id.to_string(),
                actor: "worker".to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_full_lifecycle_finalizes_and_books_once() {
        let fixture = fixture();
        let case_id = registered_case(&fixture);
        walk_to_pending_approval(&fixture, &case_id);

        let approved = fixture
            .service
            .approve(ApproveCommand { case_id: case_id.clone(), approver: "approver".to_string() })
            .unwrap();
        assert_eq!(approved.decision.result.total_amount(), 189_996);
        assert!(approved.decision.notification_owed);

        let (case, _) = fixture.service.get_case(&case_id).unwrap();
        assert_eq!(case.state(), CaseState::Finalized);

        // Booked under the version the approval read (four transitions).
        let key = format!("{}:v4", case_id);
        assert_eq!(
            fixture.ledger.committed_decision(&key),
            Some(approved.decision.id.clone())
        );

        let decisions = fixture.service.decisions_for_case(&case_id).unwrap();
        assert_eq!(decisions.len(), 1);
    }

    #[test]
    fn test_calculate_requires_approved_criteria() {
        let fixture = fixture();
        let case_id = registered_case(&fixture);
        fixture
            .service
            .submit_assessment(SubmitAssessmentCommand {
                case_id: case_id.clone(),
                actor: "worker".to_string(),
                criteria: vec![Criterion::new(
                    CriterionKind::NetWorth,
                    vec![AssessmentSubPeriod {
                        period: full_year(),
                        verdict: Verdict::Unclear,
                    }],
                )],
            })
            .unwrap();

        let err = fixture
            .service
            .calculate(CalculateCommand { case_id, actor: "worker".to_string() })
            .unwrap_err();
        assert_eq!(
            err,
            CaseError::CriteriaNotSatisfied {
                kind: CriterionKind::NetWorth,
                verdict: Verdict::Unclear,
            }
        );
    }

    #[test]
    fn test_approver_must_differ_from_last_handler() {
        let fixture = fixture();
        let case_id = registered_case(&fixture);
        walk_to_pending_approval(&fixture, &case_id);

        let err = fixture
            .service
            .approve(ApproveCommand { case_id, approver: "worker".to_string() })
            .unwrap_err();
        assert_eq!(err, CaseError::SameActorConflict { actor: "worker".to_string() });
    }

    #[test]
    fn test_unreconciled_payment_drops_case_back_to_simulated() {
        let fixture = fixture();
        let case_id = registered_case(&fixture);
        // The ledger paid March under a decision the engine never saw.
        fixture.ledger.record_disbursed(
            &case_id,
            vec![MonthlyAmount { month: month(3), amount: 20_000 }],
        );
        walk_to_pending_approval(&fixture, &case_id);

        let err = fixture
            .service
            .approve(ApproveCommand { case_id: case_id.clone(), approver: "approver".to_string() })
            .unwrap_err();
        let discrepancies = match err {
            CaseError::UnreconciledPayment { discrepancies } => discrepancies,
            other => panic!("expected UnreconciledPayment, got {:?}", other),
        };
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].month, month(3));
        assert_eq!(discrepancies[0].expected, 15_833 - 20_000);
        assert_eq!(discrepancies[0].simulated, 0);

        let (case, _) = fixture.service.get_case(&case_id).unwrap();
        assert_eq!(case.state(), CaseState::Simulated);
        assert!(fixture.service.decisions_for_case(&case_id).unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_ledger_leaves_case_retryable() {
        let fixture = fixture();
        let case_id = registered_case(&fixture);
        walk_to_pending_approval(&fixture, &case_id);
        let (_, version_before) = fixture.service.get_case(&case_id).unwrap();

        fixture.ledger.set_unavailable(true);
        let err = fixture
            .service
            .approve(ApproveCommand { case_id: case_id.clone(), approver: "approver".to_string() })
            .unwrap_err();
        assert_eq!(err, CaseError::ExternalUnavailable);

        let (case, version_after) = fixture.service.get_case(&case_id).unwrap();
        assert_eq!(case.state(), CaseState::PendingApproval);
        assert_eq!(version_after, version_before);

        fixture.ledger.set_unavailable(false);
        fixture
            .service
            .approve(ApproveCommand { case_id, approver: "approver".to_string() })
            .unwrap();
    }

    #[test]
    fn test_revise_basis_invalidates_calculation() {
        let fixture = fixture();
        let case_id = registered_case(&fixture);
        fixture
            .service
            .submit_assessment(SubmitAssessmentCommand {
                case_id: case_id.clone(),
                actor: "worker".to_string(),
                criteria: approved_criteria(),
            })
            .unwrap();
        fixture
            .service
            .calculate(CalculateCommand {
                case_id: case_id.clone(),
                actor: "worker".to_string(),
            })
            .unwrap();

        let revised = fixture
            .service
            .revise_basis(ReviseBasisCommand {
                case_id: case_id.clone(),
                actor: "worker".to_string(),
                new_entries: Vec::new(),
                supersede_ids: Vec::new(),
            })
            .unwrap();
        assert_eq!(revised.state, CaseState::AssessedPending);

        let (case, _) = fixture.service.get_case(&case_id).unwrap();
        assert!(case.calculation().is_none());
    }

    #[test]
    fn test_finalized_case_cannot_be_closed() {
        let fixture = fixture();
        let case_id = registered_case(&fixture);
        walk_to_pending_approval(&fixture, &case_id);
        fixture
            .service
            .approve(ApproveCommand { case_id: case_id.clone(), approver: "approver".to_string() })
            .unwrap();
        let (_, version_before) = fixture.service.get_case(&case_id).unwrap();

        let err = fixture
            .service
            .close(CloseCaseCommand { case_id: case_id.clone(), actor: "worker".to_string() })
            .unwrap_err();
        assert_eq!(err, CaseError::CannotCloseFinalized);

        let (case, version_after) = fixture.service.get_case(&case_id).unwrap();
        assert_eq!(case.state(), CaseState::Finalized);
        assert_eq!(version_after, version_before);
    }
}
