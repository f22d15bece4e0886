use crate::error::{BillingError, Result};
use crate::schema::{TariffCategory, UnitType};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn unit_multiplier() -> f64 {
    1.0
}

/// A known retailer price change that historical rate data does not yet
/// reflect. Applied to annualized estimates only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PriceAdjustment {
    #[schemars(description = "Tariff category the adjustment targets.")]
    pub category: TariffCategory,

    #[serde(default)]
    #[schemars(description = "Restrict to one fuel. Omit to apply to both.")]
    pub unit_type: Option<UnitType>,

    #[schemars(
        description = "First date the change is in force. Estimates whose latest reading is earlier are left alone."
    )]
    pub effective_from: NaiveDate,

    #[serde(default = "unit_multiplier")]
    pub unit_rate_multiplier: f64,

    #[serde(default = "unit_multiplier")]
    pub standing_charge_multiplier: f64,

    #[serde(default)]
    pub note: String,
}

impl PriceAdjustment {
    pub fn applies_to(
        &self,
        category: TariffCategory,
        unit_type: UnitType,
        as_of: NaiveDate,
    ) -> bool {
        self.category == category
            && self.unit_type.map_or(true, |u| u == unit_type)
            && as_of >= self.effective_from
    }
}

/// Combined effect of every adjustment that applied to one estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedAdjustment {
    pub unit_rate_multiplier: f64,
    pub standing_charge_multiplier: f64,
    pub notes: Vec<String>,
}

impl Default for AppliedAdjustment {
    fn default() -> Self {
        Self {
            unit_rate_multiplier: 1.0,
            standing_charge_multiplier: 1.0,
            notes: Vec::new(),
        }
    }
}

impl AppliedAdjustment {
    pub fn is_identity(&self) -> bool {
        self.notes.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(transparent)]
pub struct PriceAdjustments {
    adjustments: Vec<PriceAdjustment>,
}

impl Default for PriceAdjustments {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PriceAdjustments {
    pub fn new(adjustments: Vec<PriceAdjustment>) -> Self {
        Self { adjustments }
    }

    /// An empty table, for estimates that should reflect rate data only.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    /// Tracker unit rates rose 5% on 11 Dec 2023 with standing charges up
    /// 15% (electricity) and 2% (gas).
    pub fn builtin() -> Self {
        let effective_from = NaiveDate::from_ymd_opt(2023, 12, 11).unwrap_or(NaiveDate::MIN);
        Self::new(vec![
            PriceAdjustment {
                category: TariffCategory::Tracker,
                unit_type: Some(UnitType::Electricity),
                effective_from,
                unit_rate_multiplier: 1.05,
                standing_charge_multiplier: 1.15,
                note: "Tracker electricity price change from 2023-12-11".to_string(),
            },
            PriceAdjustment {
                category: TariffCategory::Tracker,
                unit_type: Some(UnitType::Gas),
                effective_from,
                unit_rate_multiplier: 1.05,
                standing_charge_multiplier: 1.02,
                note: "Tracker gas price change from 2023-12-11".to_string(),
            },
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.adjustments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceAdjustment> {
        self.adjustments.iter()
    }

    pub fn validate(&self) -> Result<()> {
        for (idx, adj) in self.adjustments.iter().enumerate() {
            for (name, value) in [
                ("unit_rate_multiplier", adj.unit_rate_multiplier),
                ("standing_charge_multiplier", adj.standing_charge_multiplier),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(BillingError::InvalidAdjustment(format!(
                        "Adjustment #{} for {} has {} {}",
                        idx, adj.category, name, value
                    )));
                }
            }
        }
        Ok(())
    }

    /// Folds every matching adjustment into a single pair of multipliers.
    pub fn resolve(
        &self,
        category: TariffCategory,
        unit_type: UnitType,
        as_of: NaiveDate,
    ) -> AppliedAdjustment {
        self.adjustments
            .iter()
            .filter(|a| a.applies_to(category, unit_type, as_of))
            .fold(AppliedAdjustment::default(), |mut acc, a| {
                acc.unit_rate_multiplier *= a.unit_rate_multiplier;
                acc.standing_charge_multiplier *= a.standing_charge_multiplier;
                acc.notes.push(a.note.clone());
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_builtin_tracker_electricity() {
        let applied = PriceAdjustments::builtin().resolve(
            TariffCategory::Tracker,
            UnitType::Electricity,
            date(2024, 3, 1),
        );
        assert!((applied.unit_rate_multiplier - 1.05).abs() < 1e-12);
        assert!((applied.standing_charge_multiplier - 1.15).abs() < 1e-12);
        assert_eq!(applied.notes.len(), 1);
    }

    #[test]
    fn test_builtin_tracker_gas() {
        let applied = PriceAdjustments::builtin().resolve(
            TariffCategory::Tracker,
            UnitType::Gas,
            date(2024, 3, 1),
        );
        assert!((applied.standing_charge_multiplier - 1.02).abs() < 1e-12);
    }

    #[test]
    fn test_not_applied_before_effective_date_or_other_category() {
        let table = PriceAdjustments::builtin();
        assert!(table
            .resolve(TariffCategory::Tracker, UnitType::Gas, date(2023, 12, 10))
            .is_identity());
        assert!(table
            .resolve(TariffCategory::Agile, UnitType::Electricity, date(2024, 3, 1))
            .is_identity());
        assert!(PriceAdjustments::none()
            .resolve(TariffCategory::Tracker, UnitType::Gas, date(2024, 3, 1))
            .is_identity());
    }

    #[test]
    fn test_adjustments_compose() {
        let table = PriceAdjustments::new(vec![
            PriceAdjustment {
                category: TariffCategory::Go,
                unit_type: None,
                effective_from: date(2024, 1, 1),
                unit_rate_multiplier: 1.1,
                standing_charge_multiplier: 1.0,
                note: "a".to_string(),
            },
            PriceAdjustment {
                category: TariffCategory::Go,
                unit_type: Some(UnitType::Electricity),
                effective_from: date(2024, 6, 1),
                unit_rate_multiplier: 1.2,
                standing_charge_multiplier: 2.0,
                note: "b".to_string(),
            },
        ]);

        let applied = table.resolve(TariffCategory::Go, UnitType::Electricity, date(2024, 7, 1));
        assert!((applied.unit_rate_multiplier - 1.32).abs() < 1e-12);
        assert!((applied.standing_charge_multiplier - 2.0).abs() < 1e-12);
        assert_eq!(applied.notes, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_validate_rejects_negative_multiplier() {
        let table = PriceAdjustments::new(vec![PriceAdjustment {
            category: TariffCategory::Fixed,
            unit_type: None,
            effective_from: date(2024, 1, 1),
            unit_rate_multiplier: -1.0,
            standing_charge_multiplier: 1.0,
            note: String::new(),
        }]);
        assert!(table.validate().is_err());
        assert!(PriceAdjustments::builtin().validate().is_ok());
    }

    #[test]
    fn test_table_deserializes_from_json_list() {
        let json = r#"[{"category": "Cosy", "effective_from": "2024-04-01", "unit_rate_multiplier": 1.1}]"#;
        let table: PriceAdjustments = serde_json::from_str(json).unwrap();
        let applied = table.resolve(TariffCategory::Cosy, UnitType::Gas, date(2024, 5, 1));
        assert!((applied.unit_rate_multiplier - 1.1).abs() < 1e-12);
        assert!((applied.standing_charge_multiplier - 1.0).abs() < 1e-12);
    }
}
