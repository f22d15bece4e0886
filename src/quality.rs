//! Input checks and consumption completeness reporting.
//!
//! Validation fails fast on inputs the matchers cannot join correctly:
//! unordered or overlapping consumption, unordered price rows, negative
//! readings. Gaps are not errors; [`coverage_report`] describes them.

use crate::error::{BillingError, Result};
use crate::schema::{
    Cadence, CalculationRequest, ConsumptionInterval, PriceCapEntry, ValidityPeriod,
};
use crate::utils::london_day;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Full check for a request priced as given. Price-cap rows must all belong
/// to one region; use [`crate::BillingProcessor::process_for_region`] for a
/// table that still holds several.
pub fn validate_request(request: &CalculationRequest) -> Result<()> {
    validate_inputs(request)?;
    validate_single_region(&request.price_caps)
}

/// Every check except price-cap region consistency.
pub fn validate_inputs(request: &CalculationRequest) -> Result<()> {
    let factor = request.gas_conversion_factor;
    if !factor.is_finite() || factor <= 0.0 {
        return Err(BillingError::InvalidConversionFactor(factor));
    }

    validate_consumption(&request.consumption)?;
    validate_periods("rate", &request.rates)?;
    validate_periods("standing charge", &request.standing_charges)?;

    for (idx, cap) in request.price_caps.iter().enumerate() {
        if !cap.electricity_cap.is_finite()
            || !cap.gas_cap.is_finite()
            || cap.electricity_cap < 0.0
            || cap.gas_cap < 0.0
        {
            return Err(BillingError::InvalidPriceCap(format!(
                "Row #{} dated {} has caps E={} G={}",
                idx, cap.effective_date, cap.electricity_cap, cap.gas_cap
            )));
        }
    }

    request.adjustments.validate()
}

/// Untagged rows are taken as already filtered and mix with any one region.
pub fn validate_single_region(caps: &[PriceCapEntry]) -> Result<()> {
    let mut seen: Option<&str> = None;
    for (idx, cap) in caps.iter().enumerate() {
        let Some(region) = cap.region.as_deref().map(|r| r.trim_start_matches('_')) else {
            continue;
        };
        match seen {
            Some(first) if first != region => {
                return Err(BillingError::InvalidPriceCap(format!(
                    "Row #{} is for region {} but earlier rows are for region {}",
                    idx, region, first
                )));
            }
            Some(_) => {}
            None => seen = Some(region),
        }
    }
    Ok(())
}

pub fn validate_consumption(consumption: &[ConsumptionInterval]) -> Result<()> {
    let mut previous: Option<&ConsumptionInterval> = None;

    for (index, interval) in consumption.iter().enumerate() {
        if !interval.consumption.is_finite() || interval.consumption < 0.0 {
            return Err(BillingError::NegativeConsumption {
                index,
                value: interval.consumption,
            });
        }

        if interval.interval_end <= interval.interval_start {
            return Err(BillingError::InvalidInterval {
                index,
                details: format!(
                    "interval_end {} is not after interval_start {}",
                    interval.interval_end, interval.interval_start
                ),
            });
        }

        if let Some(prev) = previous {
            if interval.interval_start <= prev.interval_start {
                return Err(BillingError::UnorderedSeries {
                    series: "consumption".to_string(),
                    index,
                    details: format!(
                        "interval_start {} does not follow {}",
                        interval.interval_start, prev.interval_start
                    ),
                });
            }
            if interval.interval_start < prev.interval_end {
                return Err(BillingError::OverlappingIntervals {
                    index,
                    start: interval.interval_start.to_rfc3339(),
                    previous_end: prev.interval_end.to_rfc3339(),
                });
            }
        }

        previous = Some(interval);
    }

    Ok(())
}

/// Rows must be in ascending `valid_from` order. Equal starts are allowed
/// since payment-method variants share them.
pub fn validate_periods<T: ValidityPeriod>(series: &str, periods: &[T]) -> Result<()> {
    for (index, period) in periods.iter().enumerate() {
        if !period.value().is_finite() {
            return Err(BillingError::InvalidInterval {
                index,
                details: format!("{} value {} is not a number", series, period.value()),
            });
        }

        if let Some(end) = period.valid_to() {
            if end <= period.valid_from() {
                return Err(BillingError::InvalidInterval {
                    index,
                    details: format!(
                        "{} period ends at {} before it starts at {}",
                        series,
                        end,
                        period.valid_from()
                    ),
                });
            }
        }

        if index > 0 && period.valid_from() < periods[index - 1].valid_from() {
            return Err(BillingError::UnorderedSeries {
                series: series.to_string(),
                index,
                details: format!(
                    "valid_from {} precedes {}",
                    period.valid_from(),
                    periods[index - 1].valid_from()
                ),
            });
        }
    }

    Ok(())
}

/// A run of missing readings between two present ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gap {
    /// End of the last reading before the gap.
    pub from: DateTime<Utc>,
    /// Start of the first reading after the gap.
    pub to: DateTime<Utc>,
    pub missing_intervals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub first_interval: Option<DateTime<Utc>>,
    pub last_interval: Option<DateTime<Utc>>,
    pub present_intervals: usize,
    pub expected_intervals: usize,
    pub gaps: Vec<Gap>,
}

impl CoverageReport {
    pub fn missing_intervals(&self) -> usize {
        self.expected_intervals - self.present_intervals
    }

    pub fn completeness_percent(&self) -> f64 {
        if self.expected_intervals == 0 {
            100.0
        } else {
            self.present_intervals as f64 / self.expected_intervals as f64 * 100.0
        }
    }
}

/// Finds readings missing between the first and last present interval.
/// Daily gaps are counted in UK calendar days so clock changes do not
/// produce phantom gaps.
pub fn coverage_report(consumption: &[ConsumptionInterval], cadence: Cadence) -> CoverageReport {
    let mut gaps = Vec::new();

    for pair in consumption.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.interval_start <= prev.interval_end {
            continue;
        }

        let missing = match cadence {
            Cadence::Daily => {
                (london_day(next.interval_start) - london_day(prev.interval_end)).num_days()
            }
            Cadence::HalfHourly => {
                let step = cadence.step().num_seconds();
                (next.interval_start - prev.interval_end).num_seconds() / step
            }
        };

        if missing > 0 {
            gaps.push(Gap {
                from: prev.interval_end,
                to: next.interval_start,
                missing_intervals: missing as usize,
            });
        }
    }

    let present = consumption.len();
    let missing: usize = gaps.iter().map(|g| g.missing_intervals).sum();

    CoverageReport {
        first_interval: consumption.first().map(|c| c.interval_start),
        last_interval: consumption.last().map(|c| c.interval_start),
        present_intervals: present,
        expected_intervals: present + missing,
        gaps,
    }
}
