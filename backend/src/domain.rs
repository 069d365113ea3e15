//! Domain layer: models, commands and the services that drive them.

pub mod commands;
pub mod events;
pub mod models;

mod calculation_service;
mod case_service;
mod consistency_service;
mod criterion_service;
mod reconciliation_service;
mod recovery_service;

pub use calculation_service::{CalculationPolicy, CalculationService};
pub use case_service::CaseService;
pub use consistency_service::ConsistencyService;
pub use criterion_service::CriterionService;
pub use reconciliation_service::ReconciliationService;
pub use recovery_service::RecoveryService;
