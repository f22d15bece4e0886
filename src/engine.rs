use crate::adjustments::{AppliedAdjustment, PriceAdjustments};
use crate::error::Result;
use crate::matcher::{resolver_for, RateResolution, ResolutionSummary};
use crate::monthly::{MonthlyCost, MonthlyLedger};
use crate::price_cap::PriceCapTable;
use crate::quality::validate_request;
use crate::schema::*;
use crate::standing_charge::{DayCharge, DayChargeMatcher};
use crate::utils::{extrapolation_factor, london_day, month_label, pence_to_pounds, round_half_away};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

/// Annualized estimate. Money in pounds, units in kWh (or converted gas units).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateCost {
    pub total_cost: f64,
    pub total_unit: f64,
    pub total_price: f64,
    pub total_standing_charge: f64,
    /// Scale applied to reach a full comparison year, 1.0 when none.
    pub annualization_factor: f64,
    pub adjustment: AppliedAdjustment,
    pub resolution: ResolutionSummary,
}

/// Per-month net costs. No annualization or adjustment is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBreakdown {
    pub cost: Vec<MonthlyCost>,
    pub total_unit: f64,
    pub total_price: f64,
    pub total_standing_charge: f64,
    pub resolution: ResolutionSummary,
}

impl MonthlyBreakdown {
    pub fn total_cost(&self) -> f64 {
        round_half_away(self.cost.iter().map(|m| m.cost).sum(), 2)
    }
}

/// Raw running sums from one pass over the consumption series.
#[derive(Debug, Clone, Default)]
pub struct RunningTotals {
    pub price_pence: f64,
    pub standing_charge_pence: f64,
    pub units: f64,
    pub samples: usize,
    pub last_interval_start: Option<DateTime<Utc>>,
    pub resolution: ResolutionSummary,
}

/// Joins one consumption series against one tariff's rate, standing-charge
/// and price-cap series. Holds only filtered copies of its inputs, so a
/// reconciler can be reused and every call is independent.
pub struct Reconciler {
    category: TariffCategory,
    unit_type: UnitType,
    multiplier: f64,
    rates: Vec<RatePeriod>,
    standing_charges: Vec<StandingChargePeriod>,
    caps: PriceCapTable,
    adjustments: PriceAdjustments,
}

impl Reconciler {
    pub fn new(request: &CalculationRequest) -> Self {
        Self {
            category: request.tariff_category,
            unit_type: request.unit_type,
            multiplier: request.conversion_multiplier(),
            rates: billable_periods(&request.rates),
            standing_charges: billable_periods(&request.standing_charges),
            caps: PriceCapTable::new(&request.price_caps),
            adjustments: request.adjustments.clone(),
        }
    }

    pub fn with_price_caps(mut self, caps: PriceCapTable) -> Self {
        self.caps = caps;
        self
    }

    /// Single ascending pass. `before_interval` sees the totals accumulated
    /// strictly before each interval.
    pub fn scan<F>(
        &self,
        consumption: &[ConsumptionInterval],
        mut before_interval: F,
    ) -> RunningTotals
    where
        F: FnMut(&ConsumptionInterval, &RunningTotals),
    {
        let mut resolver = resolver_for(self.category, &self.rates, &self.caps, self.unit_type);
        let mut days = DayChargeMatcher::new(self.category, &self.standing_charges);
        let mut totals = RunningTotals::default();

        for interval in consumption {
            before_interval(interval, &totals);

            let units = interval.consumption * self.multiplier;
            totals.units += units;

            let resolution = resolver.resolve(interval.interval_start);
            if resolution == RateResolution::Unmatched {
                debug!("No {} rate covers {}", self.category, interval.interval_start);
            }
            totals.resolution.record_interval(&resolution);
            totals.price_pence += resolution.applied_rate() * units;

            match days.observe(interval.interval_start) {
                Some(DayCharge::Charged { pence, .. }) => {
                    totals.resolution.charged_days += 1;
                    totals.standing_charge_pence += pence;
                }
                Some(DayCharge::Unmatched { day }) => {
                    debug!("No standing charge covers {}", day);
                    totals.resolution.charged_days += 1;
                    totals.resolution.unmatched_days += 1;
                }
                None => {}
            }

            totals.samples += 1;
            totals.last_interval_start = Some(interval.interval_start);
        }

        if !totals.resolution.is_complete() {
            warn!(
                "{} {} reconciliation incomplete: {} of {} intervals and {} of {} days unmatched",
                self.category,
                self.unit_type,
                totals.resolution.unmatched_intervals,
                totals.resolution.total_intervals(),
                totals.resolution.unmatched_days,
                totals.resolution.charged_days
            );
        }

        totals
    }

    /// Annualized estimate of a year's bill.
    ///
    /// Fewer samples than a full comparison year are scaled up linearly,
    /// then category adjustments multiply the unrounded pence totals, and
    /// only then are figures rounded to the penny.
    pub fn aggregate(&self, consumption: &[ConsumptionInterval]) -> AggregateCost {
        let totals = self.scan(consumption, |_, _| {});

        let expected = self.category.cadence().samples_per_year();
        let factor = extrapolation_factor(expected, totals.samples);
        if factor != 1.0 {
            debug!(
                "Annualizing {} samples to {} (x{:.4})",
                totals.samples, expected, factor
            );
        }

        let adjustment = match totals.last_interval_start {
            Some(last) => self
                .adjustments
                .resolve(self.category, self.unit_type, london_day(last)),
            None => AppliedAdjustment::default(),
        };
        if !adjustment.is_identity() {
            debug!("Applying adjustments: {}", adjustment.notes.join("; "));
        }

        let price_pence = totals.price_pence * factor * adjustment.unit_rate_multiplier;
        let standing_pence =
            totals.standing_charge_pence * factor * adjustment.standing_charge_multiplier;

        let total_price = pence_to_pounds(price_pence);
        let total_standing_charge = pence_to_pounds(standing_pence);

        AggregateCost {
            total_cost: round_half_away(total_price + total_standing_charge, 2),
            total_unit: totals.units,
            total_price,
            total_standing_charge,
            annualization_factor: factor,
            adjustment,
            resolution: totals.resolution,
        }
    }

    /// Month-by-month net cost of the supplied series.
    pub fn monthly(&self, consumption: &[ConsumptionInterval]) -> MonthlyBreakdown {
        let mut ledger = MonthlyLedger::new();
        let totals = self.scan(consumption, |interval, so_far| {
            ledger.observe(
                &month_label(interval.interval_start),
                so_far.price_pence,
                so_far.standing_charge_pence,
            );
        });

        let cost = ledger.finish(totals.price_pence, totals.standing_charge_pence);

        MonthlyBreakdown {
            cost,
            total_unit: totals.units,
            total_price: pence_to_pounds(totals.price_pence),
            total_standing_charge: pence_to_pounds(totals.standing_charge_pence),
            resolution: totals.resolution,
        }
    }
}

/// Validates `request` and returns its annualized estimate.
pub fn estimate_annual_cost(request: &CalculationRequest) -> Result<AggregateCost> {
    validate_request(request)?;
    info!(
        "Estimating annual {} {} cost from {} samples",
        request.tariff_category,
        request.unit_type,
        request.consumption.len()
    );
    Ok(Reconciler::new(request).aggregate(&request.consumption))
}

/// Validates `request` and returns its month-by-month breakdown.
pub fn monthly_breakdown(request: &CalculationRequest) -> Result<MonthlyBreakdown> {
    validate_request(request)?;
    info!(
        "Building monthly {} {} breakdown from {} samples",
        request.tariff_category,
        request.unit_type,
        request.consumption.len()
    );
    Ok(Reconciler::new(request).monthly(&request.consumption))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjustments::PriceAdjustments;
    use crate::error::BillingError;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn daily_consumption(start: DateTime<Utc>, days: usize, kwh: f64) -> Vec<ConsumptionInterval> {
        (0..days)
            .map(|i| {
                let s = start + Duration::days(i as i64);
                ConsumptionInterval {
                    consumption: kwh,
                    interval_start: s,
                    interval_end: s + Duration::days(1),
                }
            })
            .collect()
    }

    fn flat_request(
        category: TariffCategory,
        from: DateTime<Utc>,
        rate: f64,
        charge: f64,
    ) -> CalculationRequest {
        let mut request = CalculationRequest::new(category, UnitType::Electricity);
        request.rates = vec![RatePeriod {
            unit_rate: rate,
            valid_from: from,
            valid_to: None,
            payment_method: None,
        }];
        request.standing_charges = vec![StandingChargePeriod {
            daily_charge: charge,
            valid_from: from,
            valid_to: None,
            payment_method: None,
        }];
        request.adjustments = PriceAdjustments::none();
        request
    }

    #[test]
    fn test_two_day_worked_example() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = flat_request(TariffCategory::Fixed, start, 20.0, 50.0);
        let consumption = daily_consumption(start, 2, 10.0);

        let totals = Reconciler::new(&request).scan(&consumption, |_, _| {});
        assert!((totals.price_pence - 400.0).abs() < 1e-9);
        assert!((totals.standing_charge_pence - 100.0).abs() < 1e-9);

        let breakdown = Reconciler::new(&request).monthly(&consumption);
        assert!((breakdown.total_cost() - 5.0).abs() < 1e-9);
        assert_eq!(breakdown.cost.len(), 1);
        assert_eq!(breakdown.cost[0].label, "Jan-24");
    }

    #[test]
    fn test_full_year_is_not_scaled() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let request = flat_request(TariffCategory::Svt, start, 20.0, 50.0);
        let consumption = daily_consumption(start, 365, 8.0);

        let estimate = Reconciler::new(&request).aggregate(&consumption);
        assert_eq!(estimate.annualization_factor, 1.0);
        assert!((estimate.total_price - 365.0 * 8.0 * 20.0 / 100.0).abs() < 1e-9);
        assert!((estimate.total_standing_charge - 182.5).abs() < 1e-9);
        assert!((estimate.total_cost - (584.0 + 182.5)).abs() < 1e-9);
    }

    #[test]
    fn test_partial_year_is_annualized() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = flat_request(TariffCategory::Svt, start, 20.0, 50.0);
        let consumption = daily_consumption(start, 73, 10.0);

        let estimate = Reconciler::new(&request).aggregate(&consumption);
        assert!((estimate.annualization_factor - 5.0).abs() < 1e-12);
        assert!((estimate.total_price - 730.0).abs() < 1e-9);
        assert!((estimate.total_standing_charge - 182.5).abs() < 1e-9);
        // Units stay as metered.
        assert!((estimate.total_unit - 730.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_consumption_yields_zero() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = flat_request(TariffCategory::Agile, start, 20.0, 50.0);

        let estimate = Reconciler::new(&request).aggregate(&[]);
        assert_eq!(estimate.total_cost, 0.0);
        assert_eq!(estimate.annualization_factor, 1.0);
        assert_eq!(estimate.resolution.coverage_percent(), 100.0);
        assert!(Reconciler::new(&request).monthly(&[]).cost.is_empty());
    }

    #[test]
    fn test_gas_units_are_converted_before_pricing() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut request = flat_request(TariffCategory::Fixed, start, 6.0, 30.0);
        request.unit_type = UnitType::Gas;
        request.gas_conversion_factor = 11.2;
        let consumption = daily_consumption(start, 365, 2.0);

        let estimate = Reconciler::new(&request).aggregate(&consumption);
        assert!((estimate.total_unit - 365.0 * 2.0 * 11.2).abs() < 1e-6);
        assert!((estimate.total_price - pence_to_pounds(365.0 * 2.0 * 11.2 * 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_tracker_adjustment_applies_to_unrounded_totals() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut request = flat_request(TariffCategory::Tracker, start, 20.0, 50.0);
        request.adjustments = PriceAdjustments::builtin();
        let consumption = daily_consumption(start, 365, 10.0);

        let estimate = Reconciler::new(&request).aggregate(&consumption);
        assert!((estimate.total_price - 730.0 * 1.05).abs() < 1e-9);
        let standing = pence_to_pounds(365.0 * 50.0 * 1.15);
        assert!((estimate.total_standing_charge - standing).abs() < 1e-9);
        assert!(!estimate.adjustment.is_identity());
    }

    #[test]
    fn test_unmatched_standing_charge_day_is_counted() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut request = flat_request(TariffCategory::Svt, start, 20.0, 50.0);
        request.standing_charges[0].valid_from = start + Duration::days(1);
        let consumption = daily_consumption(start, 3, 1.0);

        let totals = Reconciler::new(&request).scan(&consumption, |_, _| {});
        assert_eq!(totals.resolution.charged_days, 3);
        assert_eq!(totals.resolution.unmatched_days, 1);
        assert!((totals.standing_charge_pence - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_buckets_follow_london_months() {
        let start = Utc.with_ymd_and_hms(2024, 1, 30, 0, 0, 0).unwrap();
        let request = flat_request(TariffCategory::Fixed, start, 10.0, 100.0);
        let consumption = daily_consumption(start, 4, 10.0);

        let breakdown = Reconciler::new(&request).monthly(&consumption);
        let labels: Vec<&str> = breakdown.cost.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["Jan-24", "Feb-24"]);
        assert!((breakdown.cost[0].cost - 4.0).abs() < 1e-9);
        assert!((breakdown.cost[1].cost - 4.0).abs() < 1e-9);
        assert_eq!(
            london_day(consumption[3].interval_start),
            NaiveDate::from_ymd_opt(2024, 2, 2).unwrap()
        );
    }

    #[test]
    fn test_free_functions_reject_newest_first_rates() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut request = flat_request(TariffCategory::Agile, start, 0.0, 50.0);
        request.consumption = (0..48)
            .map(|i| {
                let s = start + Duration::minutes(30 * i);
                ConsumptionInterval {
                    consumption: 0.5,
                    interval_start: s,
                    interval_end: s + Duration::minutes(30),
                }
            })
            .collect();
        request.rates = (0..48)
            .rev()
            .map(|i| {
                let s = start + Duration::minutes(30 * i);
                RatePeriod {
                    unit_rate: 10.0 + i as f64,
                    valid_from: s,
                    valid_to: Some(s + Duration::minutes(30)),
                    payment_method: None,
                }
            })
            .collect();

        assert!(matches!(
            estimate_annual_cost(&request),
            Err(BillingError::UnorderedSeries { index: 1, .. })
        ));
        assert!(matches!(
            monthly_breakdown(&request),
            Err(BillingError::UnorderedSeries { index: 1, .. })
        ));

        request.rates.reverse();
        let breakdown = monthly_breakdown(&request).unwrap();
        assert!(breakdown.resolution.is_complete());
        assert_eq!(breakdown.resolution.matched_intervals, 48);
    }
}
