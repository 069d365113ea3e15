//! In-memory storage implementation.
//!
//! Keeps every aggregate in a mutex-guarded map keyed by id. The version
//! check and the write happen under the same lock, so no two transitions
//! on one case can both commit against the same version.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::models::case::Case;
use crate::domain::models::decision::Decision;
use crate::domain::models::recovery::RecoveryCase;

use super::traits::{
    CaseStorage, Connection, DecisionStorage, RecoveryCaseStorage, StorageError,
};

#[derive(Default)]
struct Stores {
    cases: Mutex<HashMap<String, Case>>,
    decisions: Mutex<HashMap<String, Decision>>,
    recoveries: Mutex<HashMap<String, RecoveryCase>>,
}

/// Connection over one shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryConnection {
    stores: Arc<Stores>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connection for MemoryConnection {
    type CaseRepository = CaseRepository;
    type DecisionRepository = DecisionRepository;
    type RecoveryRepository = RecoveryRepository;

    fn create_case_repository(&self) -> CaseRepository {
        CaseRepository { stores: self.stores.clone() }
    }

    fn create_decision_repository(&self) -> DecisionRepository {
        DecisionRepository { stores: self.stores.clone() }
    }

    fn create_recovery_repository(&self) -> RecoveryRepository {
        RecoveryRepository { stores: self.stores.clone() }
    }
}

#[derive(Clone)]
pub struct CaseRepository {
    stores: Arc<Stores>,
}

impl CaseStorage for CaseRepository {
    fn store_new(&self, case: &Case) -> Result<(), StorageError> {
        let mut cases = self.stores.cases.lock().unwrap();
        if cases.contains_key(case.id()) {
            return Err(StorageError::AlreadyExists(case.id().to_string()));
        }
        cases.insert(case.id().to_string(), case.clone());
        Ok(())
    }

    fn load(&self, case_id: &str) -> Result<(Case, u64), StorageError> {
        let cases = self.stores.cases.lock().unwrap();
        let case = cases
            .get(case_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(case_id.to_string()))?;
        let version = case.version();
        Ok((case, version))
    }

    fn save(&self, case: &mut Case, expected_version: u64) -> Result<u64, StorageError> {
        let mut cases = self.stores.cases.lock().unwrap();
        let stored = cases
            .get(case.id())
            .ok_or_else(|| StorageError::NotFound(case.id().to_string()))?;
        if stored.version() != expected_version {
            return Err(StorageError::ConcurrentModification {
                expected: expected_version,
                stored: stored.version(),
            });
        }
        let new_version = expected_version + 1;
        case.set_version(new_version);
        cases.insert(case.id().to_string(), case.clone());
        Ok(new_version)
    }
}

#[derive(Clone)]
pub struct DecisionRepository {
    stores: Arc<Stores>,
}

impl DecisionStorage for DecisionRepository {
    fn store_decision(&self, decision: &Decision) -> Result<(), StorageError> {
        self.stores
            .decisions
            .lock()
            .unwrap()
            .insert(decision.id.clone(), decision.clone());
        Ok(())
    }

    fn get_decision(&self, decision_id: &str) -> Result<Option<Decision>, StorageError> {
        Ok(self.stores.decisions.lock().unwrap().get(decision_id).cloned())
    }

    fn decisions_for_case(&self, case_id: &str) -> Result<Vec<Decision>, StorageError> {
        let decisions = self.stores.decisions.lock().unwrap();
        let mut matched: Vec<Decision> = decisions
            .values()
            .filter(|d| d.case_id == case_id)
            .cloned()
            .collect();
        matched.sort_by_key(|d| d.decided_at);
        Ok(matched)
    }
}

#[derive(Clone)]
pub struct RecoveryRepository {
    stores: Arc<Stores>,
}

impl RecoveryCaseStorage for RecoveryRepository {
    fn store_new(&self, recovery: &RecoveryCase) -> Result<(), StorageError> {
        let mut recoveries = self.stores.recoveries.lock().unwrap();
        if recoveries.contains_key(recovery.id()) {
            return Err(StorageError::AlreadyExists(recovery.id().to_string()));
        }
        recoveries.insert(recovery.id().to_string(), recovery.clone());
        Ok(())
    }

    fn load(&self, recovery_id: &str) -> Result<(RecoveryCase, u64), StorageError> {
        let recoveries = self.stores.recoveries.lock().unwrap();
        let recovery = recoveries
            .get(recovery_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(recovery_id.to_string()))?;
        let version = recovery.version();
        Ok((recovery, version))
    }

    fn save(
        &self,
        recovery: &mut RecoveryCase,
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        let mut recoveries = self.stores.recoveries.lock().unwrap();
        let stored = recoveries
            .get(recovery.id())
            .ok_or_else(|| StorageError::NotFound(recovery.id().to_string()))?;
        if stored.version() != expected_version {
            return Err(StorageError::ConcurrentModification {
                expected: expected_version,
                stored: stored.version(),
            });
        }
        let new_version = expected_version + 1;
        recovery.set_version(new_version);
        recoveries.insert(recovery.id().to_string(), recovery.clone());
        Ok(new_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::period::{Month, Period};

    fn test_case() -> Case {
        let period =
            Period::try_new(Month::new(2024, 1).unwrap(), Month::new(2024, 12).unwrap()).unwrap();
        Case::new("applicant-1".to_string(), period, Vec::new())
    }

    #[test]
    fn test_load_returns_stored_version() {
        let conn = MemoryConnection::new();
        let repo = conn.create_case_repository();
        let case = test_case();
        repo.store_new(&case).unwrap();

        let (loaded, version) = repo.load(case.id()).unwrap();
        assert_eq!(version, 0);
        assert_eq!(loaded.id(), case.id());
    }

    #[test]
    fn test_save_advances_version() {
        let conn = MemoryConnection::new();
        let repo = conn.create_case_repository();
        let case = test_case();
        repo.store_new(&case).unwrap();

        let (mut loaded, version) = repo.load(case.id()).unwrap();
        let new_version = repo.save(&mut loaded, version).unwrap();
        assert_eq!(new_version, 1);
        assert_eq!(loaded.version(), 1);
    }

    #[test]
    fn test_stale_save_is_rejected() {
        let conn = MemoryConnection::new();
        let repo = conn.create_case_repository();
        let case = test_case();
        repo.store_new(&case).unwrap();

        let (mut first, v) = repo.load(case.id()).unwrap();
        let (mut second, _) = repo.load(case.id()).unwrap();

        repo.save(&mut first, v).unwrap();
        let err = repo.save(&mut second, v).unwrap_err();
        assert_eq!(err, StorageError::ConcurrentModification { expected: 0, stored: 1 });
    }

    #[test]
    fn test_double_registration_rejected() {
        let conn = MemoryConnection::new();
        let repo = conn.create_case_repository();
        let case = test_case();
        repo.store_new(&case).unwrap();
        assert!(matches!(repo.store_new(&case), Err(StorageError::AlreadyExists(_))));
    }
}
