use chrono::{Duration, TimeZone, Utc};
use tariff_reconciler::*;

fn main() {
    println!("⚡ Annual Estimate Demo\n");
    println!("Prices six months of daily meter readings on three tariffs and");
    println!("scales each to a full year so they can be compared side by side.\n");

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let consumption: Vec<ConsumptionInterval> = (0..182)
        .map(|i| {
            let s = start + Duration::days(i);
            // Heavier use in winter, tapering into summer
            let kwh = 12.0 - (i as f64 / 182.0) * 5.0;
            ConsumptionInterval {
                consumption: kwh,
                interval_start: s,
                interval_end: s + Duration::days(1),
            }
        })
        .collect();

    let tariff = |category: TariffCategory, unit_rate: f64, charge: f64| {
        let mut request = CalculationRequest::new(category, UnitType::Electricity);
        request.consumption = consumption.clone();
        request.rates = vec![RatePeriod {
            unit_rate,
            valid_from: start,
            valid_to: None,
            payment_method: None,
        }];
        request.standing_charges = vec![StandingChargePeriod {
            daily_charge: charge,
            valid_from: start,
            valid_to: None,
            payment_method: None,
        }];
        request
    };

    let mut variable = tariff(TariffCategory::Svt, 29.5, 53.35);
    variable.price_caps = vec![PriceCapEntry {
        effective_date: start.date_naive(),
        electricity_cap: 28.62,
        gas_cap: 7.42,
        region: None,
    }];

    let candidates = vec![
        TariffCandidate::new("Fixed 12M", tariff(TariffCategory::Fixed, 27.0, 48.0)),
        TariffCandidate::new("Standard variable", variable),
        TariffCandidate::new("Fixed 24M", tariff(TariffCategory::Fixed, 25.4, 55.0)),
    ];

    let report = coverage_report(&consumption, Cadence::Daily);
    println!("📋 Readings:");
    println!(
        "  {} days present, {:.1}% complete",
        report.present_intervals,
        report.completeness_percent()
    );
    println!();

    match compare_tariffs(&candidates, Some("Standard variable")) {
        Ok(rows) => {
            println!("✅ Annualized estimates (cheapest first):\n");
            for row in &rows {
                println!(
                    "  {:<18} £{:>8.2}  (units £{:>8.2}, standing £{:>7.2}, x{:.3})",
                    row.label,
                    row.estimate.total_cost,
                    row.estimate.total_price,
                    row.estimate.total_standing_charge,
                    row.estimate.annualization_factor
                );
                if let Some(saving) = row.saving_vs_baseline {
                    println!("  {:<18} saves £{:.2} against the variable tariff", "", saving);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            return;
        }
    }

    let mut monthly = tariff(TariffCategory::Fixed, 27.0, 48.0);
    monthly.mode = CalculationMode::Monthly;
    match calculate(&monthly) {
        Ok(CalculationResult::Monthly(breakdown)) => {
            println!("\n📅 Fixed 12M month by month:\n");
            for month in &breakdown.cost {
                println!("  {}: £{:>7.2}", month.label, month.cost);
            }
            println!("  Total: £{:.2}", breakdown.total_cost());
        }
        Ok(other) => println!("Unexpected result: {:?}", other),
        Err(e) => eprintln!("❌ Error: {}", e),
    }
}
