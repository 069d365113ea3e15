//! Recovery case orchestration.
//!
//! Same load-transition-save shape as the case service, over the smaller
//! recovery state machine.

use log::info;

use crate::domain::commands::recovery::{
    AnnulRecoveryCommand, CloseRecoveryCommand, DecideRecoveryCommand, OpenRecoveryCommand,
    OpenRecoveryResult, RecoveryTransitionResult, SendRecoveryCommand, StartReviewCommand,
};
use crate::domain::models::recovery::{RecoveryCase, RecoveryError};
use crate::storage::{Connection, RecoveryCaseStorage, StorageError};

impl From<StorageError> for RecoveryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConcurrentModification { .. } => RecoveryError::ConcurrentModification,
            StorageError::NotFound(id) => RecoveryError::NotFound(id),
            StorageError::AlreadyExists(_) => RecoveryError::ConcurrentModification,
        }
    }
}

pub struct RecoveryService<C: Connection> {
    repository: C::RecoveryRepository,
}

impl<C: Connection> RecoveryService<C> {
    pub fn new(connection: &C) -> Self {
        Self { repository: connection.create_recovery_repository() }
    }

    pub fn open(&self, command: OpenRecoveryCommand) -> Result<OpenRecoveryResult, RecoveryError> {
        let recovery = RecoveryCase::new(command.case_id, command.overpaid);
        self.repository.store_new(&recovery)?;
        info!(
            "Opened recovery {} for case {}, overpaid total {}",
            recovery.id(),
            recovery.case_id(),
            recovery.overpaid_total()
        );
        Ok(OpenRecoveryResult { recovery_id: recovery.id().to_string() })
    }

    pub fn get(&self, recovery_id: &str) -> Result<(RecoveryCase, u64), RecoveryError> {
        Ok(self.repository.load(recovery_id)?)
    }

    pub fn start_review(
        &self,
        command: StartReviewCommand,
    ) -> Result<RecoveryTransitionResult, RecoveryError> {
        self.transition(&command.recovery_id, |recovery| recovery.start_review())
    }

    pub fn decide(
        &self,
        command: DecideRecoveryCommand,
    ) -> Result<RecoveryTransitionResult, RecoveryError> {
        self.transition(&command.recovery_id, |recovery| recovery.decide(command.outcome))
    }

    pub fn send(
        &self,
        command: SendRecoveryCommand,
    ) -> Result<RecoveryTransitionResult, RecoveryError> {
        self.transition(&command.recovery_id, |recovery| recovery.send())
    }

    pub fn close(
        &self,
        command: CloseRecoveryCommand,
    ) -> Result<RecoveryTransitionResult, RecoveryError> {
        self.transition(&command.recovery_id, |recovery| recovery.close())
    }

    pub fn annul(
        &self,
        command: AnnulRecoveryCommand,
    ) -> Result<RecoveryTransitionResult, RecoveryError> {
        self.transition(&command.recovery_id, |recovery| recovery.annul())
    }

    fn transition(
        &self,
        recovery_id: &str,
        op: impl FnOnce(&mut RecoveryCase) -> Result<(), RecoveryError>,
    ) -> Result<RecoveryTransitionResult, RecoveryError> {
        let (mut recovery, read_version) = self.repository.load(recovery_id)?;
        op(&mut recovery)?;
        let version = self.repository.save(&mut recovery, read_version)?;
        info!("Recovery {} moved to {}", recovery.id(), recovery.state());
        Ok(RecoveryTransitionResult { state: recovery.state(), version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::calculation::MonthlyAmount;
    use crate::domain::models::period::Month;
    use crate::domain::models::recovery::{RecoveryOutcome, RecoveryState};
    use crate::storage::MemoryConnection;

    fn service() -> RecoveryService<MemoryConnection> {
        RecoveryService::new(&MemoryConnection::new())
    }

    fn open(service: &RecoveryService<MemoryConnection>) -> String {
        service
            .open(OpenRecoveryCommand {
                case_id: "case-1".to_string(),
                overpaid: vec![MonthlyAmount {
                    month: Month::new(2024, 3).unwrap(),
                    amount: 3_833,
                }],
            })
            .unwrap()
            .recovery_id
    }

    #[test]
    fn test_full_flow_advances_version_each_step() {
        let service = service();
        let id = open(&service);

        let reviewed = service
            .start_review(StartReviewCommand { recovery_id: id.clone() })
            .unwrap();
        assert_eq!(reviewed.state, RecoveryState::UnderReview);
        assert_eq!(reviewed.version, 1);

        let decided = service
            .decide(DecideRecoveryCommand {
                recovery_id: id.clone(),
                outcome: RecoveryOutcome::Recover,
            })
            .unwrap();
        assert_eq!(decided.version, 2);

        service.send(SendRecoveryCommand { recovery_id: id.clone() }).unwrap();
        let closed = service.close(CloseRecoveryCommand { recovery_id: id.clone() }).unwrap();
        assert_eq!(closed.state, RecoveryState::Closed);
        assert_eq!(closed.version, 4);

        let (recovery, _) = service.get(&id).unwrap();
        assert_eq!(recovery.outcome(), Some(RecoveryOutcome::Recover));
    }

    #[test]
    fn test_annul_rejected_after_close() {
        let service = service();
        let id = open(&service);
        service.start_review(StartReviewCommand { recovery_id: id.clone() }).unwrap();
        service
            .decide(DecideRecoveryCommand {
                recovery_id: id.clone(),
                outcome: RecoveryOutcome::FullWaiver,
            })
            .unwrap();
        service.send(SendRecoveryCommand { recovery_id: id.clone() }).unwrap();
        service.close(CloseRecoveryCommand { recovery_id: id.clone() }).unwrap();

        assert_eq!(
            service.annul(AnnulRecoveryCommand { recovery_id: id }),
            Err(RecoveryError::CannotAnnulTerminal)
        );
    }

    #[test]
    fn test_unknown_recovery_id() {
        let service = service();
        assert_eq!(
            service.start_review(StartReviewCommand { recovery_id: "missing".to_string() }),
            Err(RecoveryError::NotFound("missing".to_string()))
        );
    }
}
