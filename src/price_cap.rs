use crate::matcher::RateResolution;
use crate::schema::{GspRegion, PriceCapEntry, UnitType};
use crate::utils::london_day;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;

/// One region's price-cap history, ordered by effective date.
#[derive(Debug, Clone, Default)]
pub struct PriceCapTable {
    entries: Vec<PriceCapEntry>,
}

impl PriceCapTable {
    pub fn new(entries: &[PriceCapEntry]) -> Self {
        let mut entries = entries.to_vec();
        entries.sort_by_key(|e| e.effective_date);
        Self { entries }
    }

    /// Keeps rows tagged with `region` plus untagged rows, which are assumed
    /// to be pre-filtered by the caller.
    pub fn for_region(entries: &[PriceCapEntry], region: GspRegion) -> Self {
        let key = region.table_key();
        let regional: Vec<PriceCapEntry> = entries
            .iter()
            .filter(|e| match e.region.as_deref() {
                None => true,
                Some(r) => r == key || r == key.trim_start_matches('_'),
            })
            .cloned()
            .collect();
        debug!(
            "Price cap table for region {}: {} of {} rows",
            region,
            regional.len(),
            entries.len()
        );
        Self::new(&regional)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The row in force on `day`: the latest one effective on or before it.
    pub fn entry_on(&self, day: NaiveDate) -> Option<&PriceCapEntry> {
        let idx = self.entries.partition_point(|e| e.effective_date <= day);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    pub fn cap_at(&self, instant: DateTime<Utc>, unit_type: UnitType) -> Option<f64> {
        self.entry_on(london_day(instant)).map(|e| e.cap_for(unit_type))
    }

    /// Applies the cap in force at `instant`. With no cap row the rate is
    /// left as is; a missing row never means a cap of zero.
    pub fn clamp(&self, rate: f64, instant: DateTime<Utc>, unit_type: UnitType) -> RateResolution {
        match self.cap_at(instant, unit_type) {
            Some(cap) if rate > cap => RateResolution::Capped { rate: cap, cap },
            _ => RateResolution::Matched { rate },
        }
    }
}
