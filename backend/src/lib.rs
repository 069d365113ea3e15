//! Benefit case engine.
//!
//! The [`Backend`] facade wires the domain services to a backing store,
//! the external payment ledger and the person registry. Embedders hold
//! one `Backend` and drive cases through its services; everything else
//! in the crate is reachable from here.

pub mod domain;
pub mod ledger;
pub mod registry;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;
use log::info;

use domain::{CalculationPolicy, CaseService, RecoveryService};
use domain::models::rate_table::{CachedRateProvider, RateProvider, RateTable, StaticRateProvider};
use ledger::PaymentLedger;
use registry::PersonRegistry;
use storage::MemoryConnection;

/// How many rate lookups the backend memoizes per service instance.
const RATE_CACHE_CAPACITY: usize = 256;

pub struct Backend {
    pub case_service: CaseService<MemoryConnection>,
    pub recovery_service: RecoveryService<MemoryConnection>,
}

impl Backend {
    /// Wires the services over the in-memory store.
    pub fn new(
        rate_table: RateTable,
        policy: CalculationPolicy,
        ledger: Arc<dyn PaymentLedger>,
        registry: Arc<dyn PersonRegistry>,
    ) -> Result<Self> {
        let connection = MemoryConnection::new();
        let rates: Arc<dyn RateProvider> = Arc::new(CachedRateProvider::new(
            StaticRateProvider::new(rate_table),
            RATE_CACHE_CAPACITY,
        ));

        let case_service = CaseService::new(&connection, rates, policy, ledger, registry);
        let recovery_service = RecoveryService::new(&connection);

        info!("Backend initialized");
        Ok(Self { case_service, recovery_service })
    }
}
