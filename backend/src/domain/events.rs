//! Mapping from the case event log to the outbound event DTOs.
//!
//! Downstream consumers (document generation, audit) receive the shared
//! DTO shapes, never the aggregate's internal event type.

use crate::domain::models::case::{Case, CaseEvent, CaseState};
use crate::domain::models::period::Month;

fn state_dto(state: CaseState) -> shared::CaseState {
    match state {
        CaseState::Created => shared::CaseState::Created,
        CaseState::AssessedPending => shared::CaseState::AssessedPending,
        CaseState::Calculated => shared::CaseState::Calculated,
        CaseState::Simulated => shared::CaseState::Simulated,
        CaseState::PendingApproval => shared::CaseState::PendingApproval,
        CaseState::Finalized => shared::CaseState::Finalized,
        CaseState::Closed => shared::CaseState::Closed,
    }
}

fn month_dto(month: Month) -> shared::MonthRef {
    shared::MonthRef { year: month.year, month: month.month }
}

/// Renders the case's full event log as outbound events, in log order.
pub fn engine_events(case: &Case) -> Vec<shared::EngineEvent> {
    case.events()
        .iter()
        .map(|event| match event {
            CaseEvent::StateChanged { from, to, actor, at } => {
                shared::EngineEvent::CaseStateChanged(shared::CaseStateChanged {
                    case_id: case.id().to_string(),
                    from: state_dto(*from),
                    to: state_dto(*to),
                    actor: actor.clone(),
                    occurred_at: at.to_rfc3339(),
                })
            }
            CaseEvent::DiscrepancyRaised { discrepancy, at } => {
                shared::EngineEvent::DiscrepancyRaised(shared::DiscrepancyRaised {
                    case_id: case.id().to_string(),
                    month: month_dto(discrepancy.month),
                    expected: discrepancy.expected,
                    simulated: discrepancy.simulated,
                    occurred_at: at.to_rfc3339(),
                })
            }
            CaseEvent::DecisionFinalized { decision_id, total_amount, at } => {
                shared::EngineEvent::DecisionFinalized(shared::DecisionFinalized {
                    case_id: case.id().to_string(),
                    decision_id: decision_id.clone(),
                    total_amount: *total_amount,
                    occurred_at: at.to_rfc3339(),
                })
            }
        })
        .collect()
}
