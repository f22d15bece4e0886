//! Interval-to-rate matching.
//!
//! Every tariff category gets its own [`RateResolver`], chosen once per
//! calculation by [`resolver_for`]. Resolvers are stateful only where the
//! policy walks the rate series with a forward cursor, which relies on both
//! series being sorted ascending (checked up front by
//! [`crate::quality::validate_request`]).

use crate::price_cap::PriceCapTable;
use crate::schema::{RatePeriod, TariffCategory, UnitType, ValidityPeriod};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of looking up the unit rate for one consumption interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RateResolution {
    /// A rate period covered the interval.
    Matched { rate: f64 },
    /// A rate period covered the interval but exceeded the price cap.
    Capped { rate: f64, cap: f64 },
    /// Nothing covered the interval. Priced at zero and reported.
    Unmatched,
}

impl RateResolution {
    /// Rate to bill at, zero when unmatched.
    pub fn applied_rate(&self) -> f64 {
        match self {
            RateResolution::Matched { rate } | RateResolution::Capped { rate, .. } => *rate,
            RateResolution::Unmatched => 0.0,
        }
    }

    pub fn is_matched(&self) -> bool {
        !matches!(self, RateResolution::Unmatched)
    }
}

/// Per-calculation tally of how well the inputs lined up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionSummary {
    pub matched_intervals: usize,
    pub capped_intervals: usize,
    pub unmatched_intervals: usize,
    pub charged_days: usize,
    pub unmatched_days: usize,
}

impl ResolutionSummary {
    pub fn record_interval(&mut self, resolution: &RateResolution) {
        match resolution {
            RateResolution::Matched { .. } => self.matched_intervals += 1,
            RateResolution::Capped { .. } => {
                self.matched_intervals += 1;
                self.capped_intervals += 1;
            }
            RateResolution::Unmatched => self.unmatched_intervals += 1,
        }
    }

    pub fn total_intervals(&self) -> usize {
        self.matched_intervals + self.unmatched_intervals
    }

    /// Share of intervals that found a rate, as a percentage.
    pub fn coverage_percent(&self) -> f64 {
        let total = self.total_intervals();
        if total == 0 {
            100.0
        } else {
            self.matched_intervals as f64 / total as f64 * 100.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unmatched_intervals == 0 && self.unmatched_days == 0
    }
}

pub trait RateResolver {
    /// Resolves the unit rate in force at `interval_start`. Calls must come
    /// in ascending order of `interval_start`.
    fn resolve(&mut self, interval_start: DateTime<Utc>) -> RateResolution;
}

/// Fixed: the latest-starting billable period applies to everything. The
/// retailer lists a fixed product's current price newest first.
pub struct FixedRate {
    rate: Option<f64>,
}

impl FixedRate {
    pub fn new(rates: &[RatePeriod]) -> Self {
        Self {
            rate: rates.last().map(|r| r.unit_rate),
        }
    }
}

impl RateResolver for FixedRate {
    fn resolve(&mut self, _interval_start: DateTime<Utc>) -> RateResolution {
        match self.rate {
            Some(rate) => RateResolution::Matched { rate },
            None => RateResolution::Unmatched,
        }
    }
}

/// SVT: containment lookup, then clamp to the cap in force that day.
pub struct CappedVariableRate<'a> {
    rates: &'a [RatePeriod],
    caps: &'a PriceCapTable,
    unit_type: UnitType,
}

impl<'a> CappedVariableRate<'a> {
    pub fn new(rates: &'a [RatePeriod], caps: &'a PriceCapTable, unit_type: UnitType) -> Self {
        Self {
            rates,
            caps,
            unit_type,
        }
    }
}

impl RateResolver for CappedVariableRate<'_> {
    fn resolve(&mut self, interval_start: DateTime<Utc>) -> RateResolution {
        match find_containing(self.rates, interval_start) {
            Some(period) => self
                .caps
                .clamp(period.unit_rate, interval_start, self.unit_type),
            None => RateResolution::Unmatched,
        }
    }
}

/// Latest-starting period that contains `instant`, by binary search over
/// periods sorted on `valid_from`.
pub fn find_containing<T: ValidityPeriod>(periods: &[T], instant: DateTime<Utc>) -> Option<&T> {
    let idx = periods.partition_point(|p| p.valid_from() <= instant);
    periods[..idx].iter().rev().find(|p| p.contains(instant))
}

/// Go / Cosy: recurring windows re-emitted per day. The cursor skips windows
/// that have closed and never rewinds, so a whole pass is O(n + m).
pub struct WindowScan<'a> {
    rates: &'a [RatePeriod],
    cursor: usize,
}

impl<'a> WindowScan<'a> {
    pub fn new(rates: &'a [RatePeriod]) -> Self {
        Self { rates, cursor: 0 }
    }
}

impl RateResolver for WindowScan<'_> {
    fn resolve(&mut self, interval_start: DateTime<Utc>) -> RateResolution {
        while let Some(window) = self.rates.get(self.cursor) {
            match window.valid_to {
                Some(end) if end <= interval_start => self.cursor += 1,
                _ => break,
            }
        }

        self.rates[self.cursor..]
            .iter()
            .take_while(|w| w.valid_from <= interval_start)
            .find(|w| w.contains(interval_start))
            .map_or(RateResolution::Unmatched, |w| RateResolution::Matched {
                rate: w.unit_rate,
            })
    }
}

/// Agile / Tracker: one rate slot per consumption slot. A two-pointer merge
/// keyed on timestamps, so a missing meter reading only skips the slot it
/// would have used and a missing rate slot only leaves its own reading
/// unmatched.
pub struct SlotJoin<'a> {
    rates: &'a [RatePeriod],
    cursor: usize,
}

impl<'a> SlotJoin<'a> {
    pub fn new(rates: &'a [RatePeriod]) -> Self {
        Self { rates, cursor: 0 }
    }
}

impl RateResolver for SlotJoin<'_> {
    fn resolve(&mut self, interval_start: DateTime<Utc>) -> RateResolution {
        while let Some(slot) = self.rates.get(self.cursor) {
            if slot.valid_from < interval_start && !slot.contains(interval_start) {
                self.cursor += 1;
            } else {
                break;
            }
        }

        match self.rates.get(self.cursor) {
            Some(slot) if slot.contains(interval_start) => RateResolution::Matched {
                rate: slot.unit_rate,
            },
            _ => RateResolution::Unmatched,
        }
    }
}

/// Picks the matching policy for a category. `rates` must already be
/// filtered to billable periods and sorted by `valid_from`.
pub fn resolver_for<'a>(
    category: TariffCategory,
    rates: &'a [RatePeriod],
    caps: &'a PriceCapTable,
    unit_type: UnitType,
) -> Box<dyn RateResolver + 'a> {
    match category {
        TariffCategory::Fixed => Box::new(FixedRate::new(rates)),
        TariffCategory::Svt => Box::new(CappedVariableRate::new(rates, caps, unit_type)),
        TariffCategory::Go | TariffCategory::Cosy => Box::new(WindowScan::new(rates)),
        TariffCategory::Agile | TariffCategory::Tracker => Box::new(SlotJoin::new(rates)),
    }
}
