//! Time-bounded facts about a case.
//!
//! A basis entry is an immutable input to calculation: a deduction, a
//! disability degree, a net worth statement or a living situation, each
//! valid for a month range. Revising a case never edits an entry in place;
//! new entries are appended and the old ones are marked superseded by the
//! aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::period::Period;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BasisValidationError {
    #[error("Monthly amount must not be negative, got {0}")]
    NegativeAmount(f64),
    #[error("Expected income must not be negative, got {0}")]
    NegativeExpectedIncome(f64),
    #[error("Asset value must not be negative, got {0}")]
    NegativeAssets(f64),
    #[error("Disability degree must be between 0 and 100, got {0}")]
    DegreeOutOfRange(u8),
}

/// Who a deduction or asset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    Applicant,
    Partner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeductionCategory {
    EmploymentIncome,
    ExpectedIncome,
    Pension,
    CapitalIncome,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LivingArrangement {
    Alone,
    WithPartner,
}

/// The variant-specific payload of a basis entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BasisKind {
    Deduction {
        /// Amount deducted from the monthly rate, whole currency units
        monthly_amount: f64,
        category: DeductionCategory,
        owner: Owner,
    },
    Disability {
        /// 0-100
        degree_percent: u8,
        expected_income: f64,
    },
    NetWorth {
        assets: f64,
        owner: Owner,
    },
    LivingSituation {
        arrangement: LivingArrangement,
        /// Identity of the partner, when known
        partner_id: Option<String>,
    },
}

/// One time-bounded fact about a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basis {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub period: Period,
    /// Set by the aggregate when a revision replaces this entry
    pub superseded: bool,
    pub kind: BasisKind,
}

impl Basis {
    fn new(period: Period, kind: BasisKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            period,
            superseded: false,
            kind,
        }
    }

    pub fn new_deduction(
        period: Period,
        monthly_amount: f64,
        category: DeductionCategory,
        owner: Owner,
    ) -> Result<Self, BasisValidationError> {
        if monthly_amount < 0.0 {
            return Err(BasisValidationError::NegativeAmount(monthly_amount));
        }
        Ok(Self::new(period, BasisKind::Deduction { monthly_amount, category, owner }))
    }

    pub fn new_disability(
        period: Period,
        degree_percent: u8,
        expected_income: f64,
    ) -> Result<Self, BasisValidationError> {
        if degree_percent > 100 {
            return Err(BasisValidationError::DegreeOutOfRange(degree_percent));
        }
        if expected_income < 0.0 {
            return Err(BasisValidationError::NegativeExpectedIncome(expected_income));
        }
        Ok(Self::new(period, BasisKind::Disability { degree_percent, expected_income }))
    }

    pub fn new_net_worth(
        period: Period,
        assets: f64,
        owner: Owner,
    ) -> Result<Self, BasisValidationError> {
        if assets < 0.0 {
            return Err(BasisValidationError::NegativeAssets(assets));
        }
        Ok(Self::new(period, BasisKind::NetWorth { assets, owner }))
    }

    pub fn new_living_situation(
        period: Period,
        arrangement: LivingArrangement,
        partner_id: Option<String>,
    ) -> Self {
        Self::new(period, BasisKind::LivingSituation { arrangement, partner_id })
    }

    /// The owner of the fact, where the variant has one. Living situation
    /// and disability always describe the applicant.
    pub fn owner(&self) -> Owner {
        match &self.kind {
            BasisKind::Deduction { owner, .. } => *owner,
            BasisKind::NetWorth { owner, .. } => *owner,
            BasisKind::Disability { .. } | BasisKind::LivingSituation { .. } => Owner::Applicant,
        }
    }

    pub fn is_living_situation(&self) -> bool {
        matches!(self.kind, BasisKind::LivingSituation { .. })
    }
}

/// A contradiction between basis entries, reported by the consistency
/// checker. Issues never abort the check; callers decide whether to block
/// downstream computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConsistencyIssue {
    /// Partner-owned deduction or net worth with no living situation
    /// declaring a partner for (part of) its period
    PartnerDataWithoutPartner { basis_id: String, period: Period },
    /// Overlapping entries for the same owner whose period boundaries do
    /// not coincide exactly
    MisalignedPeriods {
        owner: Owner,
        basis_id: String,
        other_basis_id: String,
    },
}

/// The live (non-superseded) subset of a basis collection.
pub fn live_entries(basis: &[Basis]) -> impl Iterator<Item = &Basis> {
    basis.iter().filter(|b| !b.superseded)
}
