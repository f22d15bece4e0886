use crate::matcher::find_containing;
use crate::schema::{StandingChargePeriod, TariffCategory};
use crate::utils::{london_day, london_midnight};
use chrono::{DateTime, NaiveDate, Utc};

/// Charge owed for one calendar day of consumption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayCharge {
    Charged { day: NaiveDate, pence: f64 },
    Unmatched { day: NaiveDate },
}

impl DayCharge {
    pub fn pence(&self) -> f64 {
        match self {
            DayCharge::Charged { pence, .. } => *pence,
            DayCharge::Unmatched { .. } => 0.0,
        }
    }
}

/// Emits exactly one standing charge per distinct UK calendar day seen in
/// an ascending consumption scan, however many intervals share that day.
pub struct DayChargeMatcher<'a> {
    category: TariffCategory,
    periods: &'a [StandingChargePeriod],
    current_day: Option<NaiveDate>,
}

impl<'a> DayChargeMatcher<'a> {
    /// `periods` must be billable-only and sorted by `valid_from`.
    pub fn new(category: TariffCategory, periods: &'a [StandingChargePeriod]) -> Self {
        Self {
            category,
            periods,
            current_day: None,
        }
    }

    /// Returns a charge when `interval_start` opens a new day.
    pub fn observe(&mut self, interval_start: DateTime<Utc>) -> Option<DayCharge> {
        let day = london_day(interval_start);
        if self.current_day == Some(day) {
            return None;
        }
        self.current_day = Some(day);
        Some(self.charge_for(day))
    }

    fn charge_for(&self, day: NaiveDate) -> DayCharge {
        let period = match self.category {
            TariffCategory::Fixed => self.periods.last(),
            _ => find_containing(self.periods, london_midnight(day)),
        };

        match period {
            Some(p) => DayCharge::Charged {
                day,
                pence: p.daily_charge,
            },
            None => DayCharge::Unmatched { day },
        }
    }
}
