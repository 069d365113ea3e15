//! Month-granularity periods for the benefit case engine.
//!
//! All case data is bounded by inclusive month ranges. This module contains
//! the interval arithmetic the rest of the domain is built on: overlap,
//! intersection, adjacency, bounding union and subtraction. Every operation
//! is total and side-effect free.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeriodError {
    #[error("Month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    #[error("Period start {start} must not be after end {end}")]
    InvalidRange { start: Month, end: Month },
    #[error("Cannot compute the bounding union of an empty collection")]
    EmptyInput,
}

/// A single calendar month, e.g. March 2024.
///
/// Ordered chronologically; derive works because `year` precedes `month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// The month immediately after this one.
    pub fn succ(self) -> Month {
        if self.month == 12 {
            Month { year: self.year + 1, month: 1 }
        } else {
            Month { year: self.year, month: self.month + 1 }
        }
    }

    /// The month immediately before this one.
    pub fn pred(self) -> Month {
        if self.month == 1 {
            Month { year: self.year - 1, month: 12 }
        } else {
            Month { year: self.year, month: self.month - 1 }
        }
    }

    /// Months since year 0, used for distance arithmetic.
    fn index(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// An inclusive month range. Invariant: `start <= end`, enforced at
/// construction; the fields are therefore private.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    start: Month,
    end: Month,
}

impl Period {
    pub fn try_new(start: Month, end: Month) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The period covering exactly one month.
    pub fn single(month: Month) -> Self {
        Self { start: month, end: month }
    }

    pub fn start(&self) -> Month {
        self.start
    }

    pub fn end(&self) -> Month {
        self.end
    }

    pub fn month_count(&self) -> u32 {
        (self.end.index() - self.start.index() + 1) as u32
    }

    pub fn contains_month(&self, month: Month) -> bool {
        self.start <= month && month <= self.end
    }

    pub fn contains(&self, other: &Period) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The largest period covered by both, or `None` when disjoint.
    /// Commutative, and the result is always contained in both inputs.
    pub fn intersect(&self, other: &Period) -> Option<Period> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Period {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// True iff `other` starts exactly one month after this period ends.
    /// Order-sensitive: `a.adjacent(b)` says nothing about `b.adjacent(a)`.
    pub fn adjacent(&self, other: &Period) -> bool {
        self.end.succ() == other.start
    }

    /// The smallest period covering every period in the collection.
    pub fn bounding_union(periods: &[Period]) -> Result<Period, PeriodError> {
        let first = periods.first().ok_or(PeriodError::EmptyInput)?;
        let mut start = first.start;
        let mut end = first.end;
        for p in &periods[1..] {
            start = start.min(p.start);
            end = end.max(p.end);
        }
        Ok(Period { start, end })
    }

    /// Removes `other` from this period, leaving zero, one or two remainders.
    pub fn subtract(&self, other: &Period) -> Vec<Period> {
        let Some(cut) = self.intersect(other) else {
            return vec![*self];
        };
        let mut remainder = Vec::new();
        if self.start < cut.start {
            remainder.push(Period { start: self.start, end: cut.start.pred() });
        }
        if cut.end < self.end {
            remainder.push(Period { start: cut.end.succ(), end: self.end });
        }
        remainder
    }

    pub fn months(&self) -> impl Iterator<Item = Month> {
        let end = self.end;
        let mut next = Some(self.start);
        std::iter::from_fn(move || {
            let current = next?;
            next = if current < end { Some(current.succ()) } else { None };
            Some(current)
        })
    }

    /// Collapses a sorted, de-duplicated list of months into the smallest
    /// set of contiguous periods.
    pub fn from_months(months: &[Month]) -> Vec<Period> {
        let mut out: Vec<Period> = Vec::new();
        for &month in months {
            match out.last_mut() {
                Some(last) if last.end.succ() == month => last.end = month,
                _ => out.push(Period::single(month)),
            }
        }
        out
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
