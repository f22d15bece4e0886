use crate::engine::{AggregateCost, Reconciler};
use crate::error::Result;
use crate::quality::validate_request;
use crate::schema::{CalculationRequest, TariffCategory};
use crate::utils::round_half_away;
use log::info;
use serde::Serialize;

/// One tariff to price in a side-by-side comparison.
#[derive(Debug, Clone)]
pub struct TariffCandidate {
    pub label: String,
    pub request: CalculationRequest,
}

impl TariffCandidate {
    pub fn new(label: impl Into<String>, request: CalculationRequest) -> Self {
        Self {
            label: label.into(),
            request,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub label: String,
    pub category: TariffCategory,
    pub estimate: AggregateCost,
    /// Baseline cost minus this tariff's cost; positive means cheaper.
    pub saving_vs_baseline: Option<f64>,
}

/// Prices every candidate as an annual estimate and ranks them cheapest
/// first. Each candidate is an independent calculation.
pub fn compare_tariffs(
    candidates: &[TariffCandidate],
    baseline: Option<&str>,
) -> Result<Vec<ComparisonRow>> {
    let mut rows = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        validate_request(&candidate.request)?;
        let estimate =
            Reconciler::new(&candidate.request).aggregate(&candidate.request.consumption);
        rows.push(ComparisonRow {
            label: candidate.label.clone(),
            category: candidate.request.tariff_category,
            estimate,
            saving_vs_baseline: None,
        });
    }

    let baseline_cost = baseline.and_then(|name| {
        rows.iter()
            .find(|r| r.label == name)
            .map(|r| r.estimate.total_cost)
    });

    if let Some(base) = baseline_cost {
        for row in &mut rows {
            row.saving_vs_baseline = Some(round_half_away(base - row.estimate.total_cost, 2));
        }
    }

    rows.sort_by(|a, b| a.estimate.total_cost.total_cmp(&b.estimate.total_cost));

    if let Some(best) = rows.first() {
        info!(
            "Cheapest of {} tariffs: {} at £{:.2}",
            rows.len(),
            best.label,
            best.estimate.total_cost
        );
    }

    Ok(rows)
}
