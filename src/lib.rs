//! # Tariff Reconciler
//!
//! A library for estimating historical energy bills by reconciling metered
//! consumption against time-varying unit rates, daily standing charges and
//! regional price caps.
//!
//! ## Core Concepts
//!
//! - **Consumption**: ascending half-hourly or daily meter readings, possibly with gaps
//! - **Rates**: validity periods of a unit price, matched to readings per [`TariffCategory`]
//! - **Standing Charges**: owed once per UK calendar day that has readings
//! - **Price Cap**: ceiling applied to SVT unit rates
//! - **Annualization**: partial years are scaled linearly to a full comparison year
//! - **Monthly Breakdown**: month buckets that always add up to the grand total
//!
//! ## Example
//!
//! ```rust,ignore
//! use tariff_reconciler::*;
//! use chrono::{TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let mut request = CalculationRequest::new(TariffCategory::Fixed, UnitType::Electricity);
//! request.consumption = vec![ConsumptionInterval {
//!     consumption: 10.0,
//!     interval_start: start,
//!     interval_end: start + chrono::Duration::days(1),
//! }];
//! request.rates = vec![RatePeriod {
//!     unit_rate: 20.0,
//!     valid_from: start,
//!     valid_to: None,
//!     payment_method: None,
//! }];
//!
//! let result = calculate(&request).unwrap();
//! ```

pub mod adjustments;
pub mod compare;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod matcher;
pub mod monthly;
pub mod price_cap;
pub mod quality;
pub mod schema;
pub mod standing_charge;
pub mod utils;

pub use adjustments::{AppliedAdjustment, PriceAdjustment, PriceAdjustments};
pub use compare::{compare_tariffs, ComparisonRow, TariffCandidate};
pub use engine::{
    estimate_annual_cost, monthly_breakdown, AggregateCost, MonthlyBreakdown, Reconciler,
    RunningTotals,
};
pub use error::{BillingError, Result};
pub use ingestion::*;
pub use matcher::{RateResolution, RateResolver, ResolutionSummary};
pub use monthly::{MonthlyCost, MonthlyLedger};
pub use price_cap::PriceCapTable;
pub use quality::{coverage_report, validate_inputs, validate_request, CoverageReport, Gap};
pub use schema::*;

use log::{debug, info};
use serde::Serialize;

/// Output of one calculation, shaped by [`CalculationMode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CalculationResult {
    Aggregate(AggregateCost),
    Monthly(MonthlyBreakdown),
}

impl CalculationResult {
    pub fn total_cost(&self) -> f64 {
        match self {
            CalculationResult::Aggregate(a) => a.total_cost,
            CalculationResult::Monthly(m) => m.total_cost(),
        }
    }

    pub fn resolution(&self) -> &ResolutionSummary {
        match self {
            CalculationResult::Aggregate(a) => &a.resolution,
            CalculationResult::Monthly(m) => &m.resolution,
        }
    }
}

pub struct BillingProcessor;

impl BillingProcessor {
    pub fn process(request: &CalculationRequest) -> Result<CalculationResult> {
        validate_request(request)?;
        Ok(Self::run(Reconciler::new(request), request))
    }

    /// Like [`BillingProcessor::process`] for requests whose `price_caps`
    /// still hold every region's rows.
    pub fn process_for_region(
        request: &CalculationRequest,
        region: GspRegion,
    ) -> Result<CalculationResult> {
        validate_inputs(request)?;
        let caps = PriceCapTable::for_region(&request.price_caps, region);
        Ok(Self::run(Reconciler::new(request).with_price_caps(caps), request))
    }

    fn run(reconciler: Reconciler, request: &CalculationRequest) -> CalculationResult {
        info!(
            "Reconciling {} {} consumption: {} intervals, {} rate periods, mode {:?}",
            request.tariff_category,
            request.unit_type,
            request.consumption.len(),
            request.rates.len(),
            request.mode
        );

        let result = match request.mode {
            CalculationMode::Aggregate => {
                CalculationResult::Aggregate(reconciler.aggregate(&request.consumption))
            }
            CalculationMode::Monthly => {
                CalculationResult::Monthly(reconciler.monthly(&request.consumption))
            }
        };

        debug!(
            "Total £{:.2}, rate coverage {:.1}%",
            result.total_cost(),
            result.resolution().coverage_percent()
        );
        result
    }
}

pub fn calculate(request: &CalculationRequest) -> Result<CalculationResult> {
    BillingProcessor::process(request)
}

/// Parses a JSON [`CalculationRequest`] and runs it.
pub fn calculate_json(json: &str) -> Result<CalculationResult> {
    let request: CalculationRequest = serde_json::from_str(json)?;
    calculate(&request)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKED_EXAMPLE: &str = r#"{
        "tariff_category": "Fixed",
        "unit_type": "electricity",
        "mode": "monthly",
        "consumption": [
            {"consumption": 10, "interval_start": "2024-01-01T00:00:00Z", "interval_end": "2024-01-02T00:00:00Z"},
            {"consumption": 10, "interval_start": "2024-01-02T00:00:00Z", "interval_end": "2024-01-03T00:00:00Z"}
        ],
        "rates": [
            {"value_inc_vat": 20, "valid_from": "2024-01-01T00:00:00Z", "valid_to": null, "payment_method": null}
        ],
        "standing_charges": [
            {"value_inc_vat": 50, "valid_from": "2024-01-01T00:00:00Z", "valid_to": null, "payment_method": null}
        ]
    }"#;

    #[test]
    fn test_end_to_end_json() {
        let result = calculate_json(WORKED_EXAMPLE).unwrap();

        let CalculationResult::Monthly(breakdown) = &result else {
            panic!("expected monthly result, got {:?}", result);
        };
        assert!((breakdown.total_price - 4.0).abs() < 1e-9);
        assert!((breakdown.total_standing_charge - 1.0).abs() < 1e-9);
        assert!((result.total_cost() - 5.0).abs() < 1e-9);
        assert!(result.resolution().is_complete());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["cost"][0]["Jan-24"], serde_json::json!(5.0));
    }

    #[test]
    fn test_invalid_request_fails_fast() {
        let json = WORKED_EXAMPLE.replace(r#""consumption": 10,"#, r#""consumption": -10,"#);
        assert!(matches!(
            calculate_json(&json),
            Err(BillingError::NegativeConsumption { .. })
        ));
    }

    #[test]
    fn test_process_for_region_filters_caps() {
        let mut request: CalculationRequest = serde_json::from_str(WORKED_EXAMPLE).unwrap();
        request.tariff_category = TariffCategory::Svt;
        request.mode = CalculationMode::Monthly;
        request.price_caps = vec![
            PriceCapEntry {
                effective_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                electricity_cap: 15.0,
                gas_cap: 5.0,
                region: Some("_A".to_string()),
            },
            PriceCapEntry {
                effective_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                electricity_cap: 18.0,
                gas_cap: 5.0,
                region: Some("_B".to_string()),
            },
        ];

        assert!(matches!(
            BillingProcessor::process(&request),
            Err(BillingError::InvalidPriceCap(_))
        ));

        let region: GspRegion = "B".parse().unwrap();
        let result = BillingProcessor::process_for_region(&request, region).unwrap();
        let CalculationResult::Monthly(breakdown) = result else {
            panic!("expected monthly result");
        };
        assert!((breakdown.total_price - 3.6).abs() < 1e-9);
        assert_eq!(breakdown.resolution.capped_intervals, 2);
    }
}
