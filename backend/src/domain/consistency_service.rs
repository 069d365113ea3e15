//! Cross-validation of basis data.
//!
//! The checker reports contradictions between living situation and the
//! money-side basis entries; it never fails itself. Calculation and
//! finalization refuse to proceed while the report is non-empty.

use log::debug;

use crate::domain::models::basis::{
    live_entries, Basis, BasisKind, ConsistencyIssue, LivingArrangement, Owner,
};
use crate::domain::models::period::{Month, Period};

#[derive(Clone, Default)]
pub struct ConsistencyService;

impl ConsistencyService {
    pub fn new() -> Self {
        Self
    }

    /// Returns all issues found in the live basis set, in a deterministic
    /// order (creation order of the offending entry).
    pub fn check(&self, basis: &[Basis]) -> Vec<ConsistencyIssue> {
        let live: Vec<&Basis> = live_entries(basis).collect();
        let mut issues = Vec::new();

        for entry in &live {
            if let Some(issue) = self.partner_data_without_partner(entry, &live) {
                issues.push(issue);
            }
        }
        issues.extend(self.misaligned_periods(&live));

        debug!("Consistency check found {} issue(s)", issues.len());
        issues
    }

    /// Partner-owned money facts need a living situation with a partner
    /// for every month they cover.
    fn partner_data_without_partner(
        &self,
        entry: &Basis,
        live: &[&Basis],
    ) -> Option<ConsistencyIssue> {
        let partner_owned = matches!(
            entry.kind,
            BasisKind::Deduction { owner: Owner::Partner, .. }
                | BasisKind::NetWorth { owner: Owner::Partner, .. }
        );
        if !partner_owned {
            return None;
        }

        let uncovered: Vec<Month> = entry
            .period
            .months()
            .filter(|month| !partner_recorded_for(live, *month))
            .collect();
        let missing = Period::from_months(&uncovered);
        // One issue per entry, naming the first uncovered range.
        missing.first().map(|period| ConsistencyIssue::PartnerDataWithoutPartner {
            basis_id: entry.id.clone(),
            period: *period,
        })
    }

    /// Overlapping entries for the same owner must declare the exact same
    /// period boundaries across the basis types.
    fn misaligned_periods(&self, live: &[&Basis]) -> Vec<ConsistencyIssue> {
        let mut issues = Vec::new();
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                if !checked_pair(a, b) {
                    continue;
                }
                if a.owner() == b.owner()
                    && a.period.overlaps(&b.period)
                    && a.period != b.period
                {
                    issues.push(ConsistencyIssue::MisalignedPeriods {
                        owner: a.owner(),
                        basis_id: a.id.clone(),
                        other_basis_id: b.id.clone(),
                    });
                }
            }
        }
        issues
    }
}

fn partner_recorded_for(live: &[&Basis], month: Month) -> bool {
    live.iter().any(|b| {
        matches!(
            b.kind,
            BasisKind::LivingSituation { arrangement: LivingArrangement::WithPartner, .. }
        ) && b.period.contains_month(month)
    })
}

/// Alignment is only enforced between the money-side types and living
/// situation; disability entries follow their own assessment rhythm.
fn checked_pair(a: &Basis, b: &Basis) -> bool {
    let relevant = |basis: &Basis| {
        matches!(
            basis.kind,
            BasisKind::Deduction { .. }
                | BasisKind::NetWorth { .. }
                | BasisKind::LivingSituation { .. }
        )
    };
    relevant(a) && relevant(b) && !(a.is_living_situation() && b.is_living_situation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::basis::DeductionCategory;

    fn month(m: u32) -> Month {
        Month::new(2024, m).unwrap()
    }

    fn period(from: u32, to: u32) -> Period {
        Period::try_new(month(from), month(to)).unwrap()
    }

    #[test]
    fn test_clean_basis_set_reports_nothing() {
        let basis = vec![
            Basis::new_living_situation(period(1, 12), LivingArrangement::Alone, None),
            Basis::new_deduction(
                period(1, 12),
                5_000.0,
                DeductionCategory::EmploymentIncome,
                Owner::Applicant,
            )
            .unwrap(),
        ];
        assert!(ConsistencyService::new().check(&basis).is_empty());
    }

    #[test]
    fn test_partner_net_worth_without_partner_for_one_month() {
        // Partner declared for the whole year except July.
        let basis = vec![
            Basis::new_living_situation(
                period(1, 6),
                LivingArrangement::WithPartner,
                Some("partner-1".to_string()),
            ),
            Basis::new_living_situation(period(7, 7), LivingArrangement::Alone, None),
            Basis::new_living_situation(
                period(8, 12),
                LivingArrangement::WithPartner,
                Some("partner-1".to_string()),
            ),
            Basis::new_net_worth(period(1, 12), 50_000.0, Owner::Partner).unwrap(),
        ];

        let issues = ConsistencyService::new().check(&basis);
        assert_eq!(issues.len(), 1);
        match &issues[0] {
            ConsistencyIssue::PartnerDataWithoutPartner { period: p, .. } => {
                assert_eq!(*p, Period::single(month(7)));
            }
            other => panic!("expected PartnerDataWithoutPartner, got {:?}", other),
        }
    }

    #[test]
    fn test_misaligned_periods_for_same_owner() {
        let basis = vec![
            Basis::new_living_situation(period(1, 12), LivingArrangement::Alone, None),
            Basis::new_net_worth(period(3, 9), 10_000.0, Owner::Applicant).unwrap(),
        ];

        let issues = ConsistencyService::new().check(&basis);
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues[0],
            ConsistencyIssue::MisalignedPeriods { owner: Owner::Applicant, .. }
        ));
    }

    #[test]
    fn test_superseded_entries_are_ignored() {
        let mut stale = Basis::new_net_worth(period(1, 6), 10_000.0, Owner::Partner).unwrap();
        stale.superseded = true;
        let basis = vec![
            Basis::new_living_situation(period(1, 12), LivingArrangement::Alone, None),
            stale,
        ];
        assert!(ConsistencyService::new().check(&basis).is_empty());
    }
}
