use crate::utils::{pence_to_pounds, round_half_away};
use log::debug;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Net cost of one billing month, in pounds.
///
/// Serializes as a single-key object, `{"Jan-24": 42.17}`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCost {
    pub label: String,
    pub cost: f64,
}

impl Serialize for MonthlyCost {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.label, &self.cost)?;
        map.end()
    }
}

/// Splits one running total into month buckets.
///
/// Each bucket is the rounded cumulative total at the month boundary minus
/// everything already emitted, never an independent per-month sum. The
/// buckets therefore always add up to the rounded grand total, whatever
/// floating-point drift the running sums picked up.
#[derive(Debug, Default)]
pub struct MonthlyLedger {
    buckets: Vec<MonthlyCost>,
    emitted: f64,
    current: Option<String>,
}

impl MonthlyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the label of the next interval and the running pence
    /// totals accumulated before it. Closes the open month on a change.
    pub fn observe(&mut self, label: &str, price_pence: f64, standing_charge_pence: f64) {
        match self.current.as_deref() {
            Some(current) if current == label => {}
            Some(_) => {
                self.flush(price_pence, standing_charge_pence);
                self.current = Some(label.to_string());
            }
            None => self.current = Some(label.to_string()),
        }
    }

    /// Flushes the final, possibly partial, month.
    pub fn finish(mut self, price_pence: f64, standing_charge_pence: f64) -> Vec<MonthlyCost> {
        self.flush(price_pence, standing_charge_pence);
        self.buckets
    }

    fn flush(&mut self, price_pence: f64, standing_charge_pence: f64) {
        let Some(label) = self.current.take() else {
            return;
        };
        let cumulative = pence_to_pounds(price_pence) + pence_to_pounds(standing_charge_pence);
        let cost = round_half_away(cumulative - self.emitted, 2);
        self.emitted += cost;
        debug!("Closed month {}: £{:.2} (cumulative £{:.2})", label, cost, cumulative);
        self.buckets.push(MonthlyCost { label, cost });
    }
}
