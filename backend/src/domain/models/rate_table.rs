//! Effective-dated base rates for the benefit.
//!
//! Rates are published as annual amounts per living-situation category,
//! each valid for a month range. Lookups go through the [`RateProvider`]
//! trait so the calculation engine does not care whether rates come from
//! a static table or a caching wrapper around a remote source.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use super::basis::LivingArrangement;
use super::period::{Month, Period};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateTableError {
    #[error("Rate entries for {category:?} overlap at {first} and {second}")]
    OverlappingEntries {
        category: RateCategory,
        first: Period,
        second: Period,
    },
}

/// Which base rate a month is paid at. An applicant living alone gets the
/// high rate, one living with a partner the ordinary rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateCategory {
    High,
    Ordinary,
}

impl RateCategory {
    pub fn for_arrangement(arrangement: LivingArrangement) -> Self {
        match arrangement {
            LivingArrangement::Alone => RateCategory::High,
            LivingArrangement::WithPartner => RateCategory::Ordinary,
        }
    }
}

/// One effective-dated rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub category: RateCategory,
    pub effective: Period,
    /// Annual base rate, currency units
    pub annual_rate: f64,
}

impl RateEntry {
    /// The unrounded monthly rate; rounding happens once, on the computed
    /// benefit amount.
    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate / 12.0
    }
}

/// Ordered, non-overlapping rate entries, validated at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    entries: Vec<RateEntry>,
}

impl RateTable {
    pub fn try_new(mut entries: Vec<RateEntry>) -> Result<Self, RateTableError> {
        entries.sort_by_key(|e| (e.category == RateCategory::Ordinary, e.effective.start()));
        for pair in entries.windows(2) {
            if pair[0].category == pair[1].category
                && pair[0].effective.overlaps(&pair[1].effective)
            {
                return Err(RateTableError::OverlappingEntries {
                    category: pair[0].category,
                    first: pair[0].effective,
                    second: pair[1].effective,
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn entry_for(&self, category: RateCategory, month: Month) -> Option<RateEntry> {
        self.entries
            .iter()
            .find(|e| e.category == category && e.effective.contains_month(month))
            .copied()
    }
}

/// Source of rates for the calculation engine. Pure and cacheable.
pub trait RateProvider: Send + Sync {
    fn rate_for(&self, category: RateCategory, month: Month) -> Option<RateEntry>;
}

impl<P: RateProvider + ?Sized> RateProvider for std::sync::Arc<P> {
    fn rate_for(&self, category: RateCategory, month: Month) -> Option<RateEntry> {
        (**self).rate_for(category, month)
    }
}

/// Provider backed by an owned [`RateTable`].
#[derive(Debug, Clone)]
pub struct StaticRateProvider {
    table: RateTable,
}

impl StaticRateProvider {
    pub fn new(table: RateTable) -> Self {
        Self { table }
    }
}

impl RateProvider for StaticRateProvider {
    fn rate_for(&self, category: RateCategory, month: Month) -> Option<RateEntry> {
        self.table.entry_for(category, month)
    }
}

/// Bounded memoizing wrapper around another provider. Constructed with an
/// explicit capacity and injected as a dependency; there is no process-wide
/// rate cache.
pub struct CachedRateProvider<P> {
    inner: P,
    capacity: usize,
    cache: Mutex<HashMap<(RateCategory, Month), Option<RateEntry>>>,
}

impl<P: RateProvider> CachedRateProvider<P> {
    pub fn new(inner: P, capacity: usize) -> Self {
        Self { inner, capacity, cache: Mutex::new(HashMap::new()) }
    }
}

impl<P: RateProvider> RateProvider for CachedRateProvider<P> {
    fn rate_for(&self, category: RateCategory, month: Month) -> Option<RateEntry> {
        let key = (category, month);
        let mut cache = self.cache.lock().unwrap();
        if let Some(hit) = cache.get(&key) {
            return *hit;
        }
        let entry = self.inner.rate_for(category, month);
        if cache.len() >= self.capacity {
            cache.clear();
        }
        cache.insert(key, entry);
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn month(year: i32, m: u32) -> Month {
        Month::new(year, m).unwrap()
    }

    fn period(y1: i32, m1: u32, y2: i32, m2: u32) -> Period {
        Period::try_new(month(y1, m1), month(y2, m2)).unwrap()
    }

    fn table() -> RateTable {
        RateTable::try_new(vec![
            RateEntry {
                category: RateCategory::High,
                effective: period(2023, 1, 2023, 12),
                annual_rate: 240_000.0,
            },
            RateEntry {
                category: RateCategory::High,
                effective: period(2024, 1, 2024, 12),
                annual_rate: 249_996.0,
            },
            RateEntry {
                category: RateCategory::Ordinary,
                effective: period(2023, 1, 2024, 12),
                annual_rate: 228_000.0,
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup_by_month_and_category() {
        let table = table();
        let entry = table.entry_for(RateCategory::High, month(2024, 3)).unwrap();
        assert_eq!(entry.annual_rate, 249_996.0);
        assert_eq!(entry.monthly_rate(), 20_833.0);

        let entry = table.entry_for(RateCategory::Ordinary, month(2023, 6)).unwrap();
        assert_eq!(entry.annual_rate, 228_000.0);

        assert!(table.entry_for(RateCategory::High, month(2025, 1)).is_none());
    }

    #[test]
    fn test_overlapping_entries_rejected() {
        let err = RateTable::try_new(vec![
            RateEntry {
                category: RateCategory::High,
                effective: period(2024, 1, 2024, 12),
                annual_rate: 1.0,
            },
            RateEntry {
                category: RateCategory::High,
                effective: period(2024, 6, 2025, 6),
                annual_rate: 2.0,
            },
        ])
        .unwrap_err();
        assert!(matches!(err, RateTableError::OverlappingEntries { .. }));
    }

    struct CountingProvider {
        inner: StaticRateProvider,
        calls: AtomicUsize,
    }

    impl RateProvider for CountingProvider {
        fn rate_for(&self, category: RateCategory, month: Month) -> Option<RateEntry> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.rate_for(category, month)
        }
    }

    #[test]
    fn test_cached_provider_memoizes() {
        let counting = CountingProvider {
            inner: StaticRateProvider::new(table()),
            calls: AtomicUsize::new(0),
        };
        let cached = CachedRateProvider::new(counting, 16);

        let first = cached.rate_for(RateCategory::High, month(2024, 1));
        let second = cached.rate_for(RateCategory::High, month(2024, 1));
        assert_eq!(first, second);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }
}
