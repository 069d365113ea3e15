//! Commands for the case service, one struct per state-machine operation.

use crate::domain::models::basis::Basis;
use crate::domain::models::calculation::CalculationResult;
use crate::domain::models::case::CaseState;
use crate::domain::models::criterion::Criterion;
use crate::domain::models::decision::{Decision, Discrepancy};
use crate::domain::models::period::Period;

#[derive(Debug, Clone)]
pub struct RegisterApplicationCommand {
    pub applicant_id: String,
    pub active_period: Period,
    pub initial_basis: Vec<Basis>,
}

#[derive(Debug, Clone)]
pub struct RegisterApplicationResult {
    pub case_id: String,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct SubmitAssessmentCommand {
    pub case_id: String,
    pub actor: String,
    pub criteria: Vec<Criterion>,
}

#[derive(Debug, Clone)]
pub struct ReviseBasisCommand {
    pub case_id: String,
    pub actor: String,
    pub new_entries: Vec<Basis>,
    pub supersede_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CalculateCommand {
    pub case_id: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct CalculateResult {
    pub calculation: CalculationResult,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct SimulateCommand {
    pub case_id: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct SendToApprovalCommand {
    pub case_id: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct ApproveCommand {
    pub case_id: String,
    pub approver: String,
}

#[derive(Debug, Clone)]
pub struct ApproveResult {
    pub decision: Decision,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct ReturnToAssessmentCommand {
    pub case_id: String,
    pub approver: String,
}

#[derive(Debug, Clone)]
pub struct CloseCaseCommand {
    pub case_id: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct ReconcileCommand {
    pub case_id: String,
}

#[derive(Debug, Clone)]
pub struct ReconcileResult {
    pub discrepancies: Vec<Discrepancy>,
}

#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub state: CaseState,
    pub version: u64,
}
