use crate::adjustments::PriceAdjustments;
use crate::error::{BillingError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment-method tag the retailer attaches to duplicate price rows for
/// customers who do not pay by direct debit. Those rows never apply here.
pub const NON_DIRECT_DEBIT: &str = "NON_DIRECT_DEBIT";

/// Typical UK volume-to-energy factor for gas meters reading in m³.
pub const DEFAULT_GAS_CONVERSION_FACTOR: f64 = 11.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum TariffCategory {
    #[schemars(description = "Single flat unit rate and standing charge for the whole contract.")]
    Fixed,

    #[serde(rename = "SVT", alias = "Svt")]
    #[schemars(description = "Standard variable tariff, clamped to the regional price cap.")]
    Svt,

    #[schemars(description = "Half-hourly wholesale-linked pricing, one rate per slot.")]
    Agile,

    #[schemars(description = "Time-of-use tariff with a cheap overnight window.")]
    Go,

    #[schemars(description = "Time-of-use tariff with several cheap windows per day.")]
    Cosy,

    #[schemars(description = "Daily wholesale-linked pricing, one rate per day.")]
    Tracker,
}

impl TariffCategory {
    pub const ALL: [TariffCategory; 6] = [
        TariffCategory::Fixed,
        TariffCategory::Svt,
        TariffCategory::Agile,
        TariffCategory::Go,
        TariffCategory::Cosy,
        TariffCategory::Tracker,
    ];

    /// Metering cadence the retailer reports consumption at for this category.
    pub fn cadence(&self) -> Cadence {
        match self {
            TariffCategory::Agile | TariffCategory::Go | TariffCategory::Cosy => {
                Cadence::HalfHourly
            }
            TariffCategory::Tracker | TariffCategory::Svt | TariffCategory::Fixed => Cadence::Daily,
        }
    }
}

impl fmt::Display for TariffCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TariffCategory::Fixed => "Fixed",
            TariffCategory::Svt => "SVT",
            TariffCategory::Agile => "Agile",
            TariffCategory::Go => "Go",
            TariffCategory::Cosy => "Cosy",
            TariffCategory::Tracker => "Tracker",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    #[serde(alias = "E")]
    Electricity,
    #[serde(alias = "G")]
    Gas,
}

impl UnitType {
    /// Multiplier turning raw meter units into billable energy units.
    pub fn conversion_multiplier(&self, gas_conversion_factor: f64) -> f64 {
        match self {
            UnitType::Electricity => 1.0,
            UnitType::Gas => gas_conversion_factor,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitType::Electricity => f.write_str("electricity"),
            UnitType::Gas => f.write_str("gas"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    HalfHourly,
    Daily,
}

impl Cadence {
    pub fn samples_per_day(&self) -> usize {
        match self {
            Cadence::HalfHourly => 48,
            Cadence::Daily => 1,
        }
    }

    /// Number of samples in a full comparison year.
    pub fn samples_per_year(&self) -> usize {
        365 * self.samples_per_day()
    }

    pub fn step(&self) -> Duration {
        match self {
            Cadence::HalfHourly => Duration::minutes(30),
            Cadence::Daily => Duration::days(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMode {
    #[default]
    Aggregate,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ConsumptionInterval {
    #[schemars(
        description = "Metered consumption for the interval, kWh for electricity or m³ for gas."
    )]
    pub consumption: f64,
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
}

/// Common view over the two kinds of validity-bounded price rows.
pub trait ValidityPeriod {
    fn valid_from(&self) -> DateTime<Utc>;
    fn valid_to(&self) -> Option<DateTime<Utc>>;
    fn payment_method(&self) -> Option<&str>;
    fn value(&self) -> f64;

    /// Half-open containment; an open `valid_to` runs forever.
    fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.valid_from() <= instant && self.valid_to().map_or(true, |end| instant < end)
    }

    fn is_billable(&self) -> bool {
        self.payment_method() != Some(NON_DIRECT_DEBIT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RatePeriod {
    #[serde(rename = "value_inc_vat")]
    #[schemars(description = "Unit rate in pence per unit, VAT inclusive.")]
    pub unit_rate: f64,
    pub valid_from: DateTime<Utc>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl ValidityPeriod for RatePeriod {
    fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }

    fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    fn value(&self) -> f64 {
        self.unit_rate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct StandingChargePeriod {
    #[serde(rename = "value_inc_vat")]
    #[schemars(description = "Standing charge in pence per day, VAT inclusive.")]
    pub daily_charge: f64,
    pub valid_from: DateTime<Utc>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl ValidityPeriod for StandingChargePeriod {
    fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }

    fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    fn value(&self) -> f64 {
        self.daily_charge
    }
}

/// Drops rows priced for a non-default payment method.
pub fn billable_periods<T: ValidityPeriod + Clone>(periods: &[T]) -> Vec<T> {
    periods.iter().filter(|p| p.is_billable()).cloned().collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PriceCapEntry {
    #[serde(rename = "Date")]
    #[schemars(description = "Date from which this cap row is in force (UK local).")]
    pub effective_date: NaiveDate,

    #[serde(rename = "E")]
    #[schemars(description = "Electricity unit-rate cap in pence per kWh.")]
    pub electricity_cap: f64,

    #[serde(rename = "G")]
    #[schemars(description = "Gas unit-rate cap in pence per kWh.")]
    pub gas_cap: f64,

    #[serde(rename = "Region", default)]
    pub region: Option<String>,
}

impl PriceCapEntry {
    pub fn cap_for(&self, unit_type: UnitType) -> f64 {
        match unit_type {
            UnitType::Electricity => self.electricity_cap,
            UnitType::Gas => self.gas_cap,
        }
    }
}

/// One of the fourteen UK grid supply point regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GspRegion(char);

impl GspRegion {
    const LETTERS: &'static str = "ABCDEFGHJKLMNP";

    pub fn letter(&self) -> char {
        self.0
    }

    /// Key used by the price-cap table, e.g. `_A`.
    pub fn table_key(&self) -> String {
        format!("_{}", self.0)
    }
}

impl FromStr for GspRegion {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('_');
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if Self::LETTERS.contains(c.to_ascii_uppercase()) => {
                Ok(GspRegion(c.to_ascii_uppercase()))
            }
            _ => Err(BillingError::InvalidRegion(s.to_string())),
        }
    }
}

impl fmt::Display for GspRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_gas_conversion_factor() -> f64 {
    DEFAULT_GAS_CONVERSION_FACTOR
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CalculationRequest {
    #[schemars(description = "Pricing policy used to match consumption to rates.")]
    pub tariff_category: TariffCategory,

    pub unit_type: UnitType,

    #[serde(default = "default_gas_conversion_factor")]
    #[schemars(
        description = "Multiplier converting gas meter volume to kWh. Ignored for electricity. Defaults to 11.1."
    )]
    pub gas_conversion_factor: f64,

    #[serde(default)]
    #[schemars(
        description = "'aggregate' for an annualized estimate, 'monthly' for a per-month breakdown."
    )]
    pub mode: CalculationMode,

    #[schemars(description = "Consumption intervals in ascending order of interval_start.")]
    pub consumption: Vec<ConsumptionInterval>,

    #[schemars(description = "Unit-rate periods in ascending order of valid_from.")]
    pub rates: Vec<RatePeriod>,

    #[schemars(description = "Standing-charge periods in ascending order of valid_from.")]
    pub standing_charges: Vec<StandingChargePeriod>,

    #[serde(default)]
    #[schemars(description = "One region's price-cap rows. Only consulted for SVT.")]
    pub price_caps: Vec<PriceCapEntry>,

    #[serde(default)]
    #[schemars(
        description = "Post-hoc retailer price corrections. Omit to use the built-in table."
    )]
    pub adjustments: PriceAdjustments,
}

impl CalculationRequest {
    pub fn new(tariff_category: TariffCategory, unit_type: UnitType) -> Self {
        Self {
            tariff_category,
            unit_type,
            gas_conversion_factor: DEFAULT_GAS_CONVERSION_FACTOR,
            mode: CalculationMode::Aggregate,
            consumption: Vec::new(),
            rates: Vec::new(),
            standing_charges: Vec::new(),
            price_caps: Vec::new(),
            adjustments: PriceAdjustments::default(),
        }
    }

    pub fn conversion_multiplier(&self) -> f64 {
        self.unit_type.conversion_multiplier(self.gas_conversion_factor)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CalculationRequest)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
