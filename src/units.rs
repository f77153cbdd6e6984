//! Unit conversion and display formatting
//!
//! All stored values are canonical (kilograms, percent). Conversion to the
//! user's display unit happens only here, at formatting time.

use serde::{Deserialize, Serialize};

use crate::types::ProfileParameters;

/// Kilograms per international avoirdupois pound
pub const KG_PER_LB: f64 = 0.453_592_37;

/// Pounds per stone
pub const LB_PER_STONE: f64 = 14.0;

/// Display unit for mass values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[serde(alias = "kg")]
    Kilograms,
    #[serde(alias = "lb", alias = "lbs")]
    Pounds,
}

impl WeightUnit {
    pub fn for_profile(profile: &ProfileParameters) -> Self {
        if profile.use_metric {
            WeightUnit::Kilograms
        } else {
            WeightUnit::Pounds
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            WeightUnit::Kilograms => "kg",
            WeightUnit::Pounds => "lb",
        }
    }

    /// Convert a canonical kilogram value into this unit
    pub fn from_kg(&self, kg: f64) -> f64 {
        match self {
            WeightUnit::Kilograms => kg,
            WeightUnit::Pounds => kg_to_lb(kg),
        }
    }

    /// Convert a value expressed in this unit back to kilograms
    pub fn to_kg(&self, value: f64) -> f64 {
        match self {
            WeightUnit::Kilograms => value,
            WeightUnit::Pounds => lb_to_kg(value),
        }
    }
}

pub fn kg_to_lb(kg: f64) -> f64 {
    kg / KG_PER_LB
}

pub fn lb_to_kg(lb: f64) -> f64 {
    lb * KG_PER_LB
}

pub fn stone_to_kg(stone: f64) -> f64 {
    lb_to_kg(stone * LB_PER_STONE)
}

/// Format a canonical weight in the display unit, e.g. `154.3 lb`
pub fn format_weight(kg: f64, unit: WeightUnit) -> String {
    format!("{:.1} {}", unit.from_kg(kg), unit.abbreviation())
}

/// Format a signed change, always carrying an explicit sign
pub fn format_change(kg: f64, unit: WeightUnit) -> String {
    let value = unit.from_kg(kg);
    // -0.0 would print as "-0.0"
    let value = if value.abs() < 0.05 { 0.0 } else { value };
    format!("{value:+.1} {}", unit.abbreviation())
}

pub fn format_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_pounds() {
        let kg = 70.0;
        let lb = kg_to_lb(kg);
        assert!((lb - 154.3236).abs() < 0.001);
        assert!((lb_to_kg(lb) - kg).abs() < 1e-9);
    }

    #[test]
    fn test_stone() {
        assert!((stone_to_kg(11.0) - 69.853).abs() < 0.001);
    }

    #[test]
    fn test_unit_for_profile() {
        let mut profile = ProfileParameters::default();
        assert_eq!(WeightUnit::for_profile(&profile), WeightUnit::Kilograms);
        profile.use_metric = false;
        assert_eq!(WeightUnit::for_profile(&profile), WeightUnit::Pounds);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_weight(70.0, WeightUnit::Kilograms), "70.0 kg");
        assert_eq!(format_weight(70.0, WeightUnit::Pounds), "154.3 lb");
        assert_eq!(format_change(-1.24, WeightUnit::Kilograms), "-1.2 kg");
        assert_eq!(format_change(0.5, WeightUnit::Kilograms), "+0.5 kg");
        assert_eq!(format_change(-0.01, WeightUnit::Kilograms), "+0.0 kg");
        assert_eq!(format_percent(21.456), "21.5%");
    }
}
