//! Storage abstraction traits.
//!
//! The domain layer works against these traits so the backing store can be
//! swapped without touching the services. Saving is guarded by optimistic
//! concurrency: every write carries the version the caller read, and a
//! mismatch means another transition won the race. The caller must
//! re-read and retry the whole operation, never patch state.

use crate::domain::models::case::Case;
use crate::domain::models::decision::Decision;
use crate::domain::models::recovery::RecoveryCase;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("Expected version {expected} but found {stored}")]
    ConcurrentModification { expected: u64, stored: u64 },
    #[error("Aggregate {0} not found")]
    NotFound(String),
    #[error("Aggregate {0} already exists")]
    AlreadyExists(String),
}

pub trait CaseStorage: Send + Sync {
    /// Stores a freshly registered case at version 0.
    fn store_new(&self, case: &Case) -> Result<(), StorageError>;

    /// Returns the case together with the version the copy was read at.
    fn load(&self, case_id: &str) -> Result<(Case, u64), StorageError>;

    /// Persists the case if the stored version still matches
    /// `expected_version`, advancing `case` to the new version.
    fn save(&self, case: &mut Case, expected_version: u64) -> Result<u64, StorageError>;
}

pub trait DecisionStorage: Send + Sync {
    fn store_decision(&self, decision: &Decision) -> Result<(), StorageError>;
    fn get_decision(&self, decision_id: &str) -> Result<Option<Decision>, StorageError>;
    fn decisions_for_case(&self, case_id: &str) -> Result<Vec<Decision>, StorageError>;
}

pub trait RecoveryCaseStorage: Send + Sync {
    fn store_new(&self, recovery: &RecoveryCase) -> Result<(), StorageError>;
    fn load(&self, recovery_id: &str) -> Result<(RecoveryCase, u64), StorageError>;
    fn save(&self, recovery: &mut RecoveryCase, expected_version: u64)
        -> Result<u64, StorageError>;
}

/// A connection hands out repositories bound to one backing store,
/// mirroring how services are wired to it once at construction.
pub trait Connection: Send + Sync + 'static {
    type CaseRepository: CaseStorage + Clone;
    type DecisionRepository: DecisionStorage + Clone;
    type RecoveryRepository: RecoveryCaseStorage + Clone;

    fn create_case_repository(&self) -> Self::CaseRepository;
    fn create_decision_repository(&self) -> Self::DecisionRepository;
    fn create_recovery_repository(&self) -> Self::RecoveryRepository;
}
