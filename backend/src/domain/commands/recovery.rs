//! Commands for the recovery case service.

use crate::domain::models::calculation::MonthlyAmount;
use crate::domain::models::recovery::{RecoveryOutcome, RecoveryState};

#[derive(Debug, Clone)]
pub struct OpenRecoveryCommand {
    pub case_id: String,
    pub overpaid: Vec<MonthlyAmount>,
}

#[derive(Debug, Clone)]
pub struct OpenRecoveryResult {
    pub recovery_id: String,
}

#[derive(Debug, Clone)]
pub struct StartReviewCommand {
    pub recovery_id: String,
}

#[derive(Debug, Clone)]
pub struct DecideRecoveryCommand {
    pub recovery_id: String,
    pub outcome: RecoveryOutcome,
}

#[derive(Debug, Clone)]
pub struct SendRecoveryCommand {
    pub recovery_id: String,
}

#[derive(Debug, Clone)]
pub struct CloseRecoveryCommand {
    pub recovery_id: String,
}

#[derive(Debug, Clone)]
pub struct AnnulRecoveryCommand {
    pub recovery_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryTransitionResult {
    pub state: RecoveryState,
    pub version: u64,
}
