//! Measured metric types and unit normalization.

use crate::types::define_string_enum;

define_string_enum!(
    /// A metric recorded as individual timestamped measurements.
    ///
    /// Values are stored in the metric's canonical unit: kilograms for weight
    /// and lean body mass, centimeters for height, percent for fat percentage.
    MetricType, "metric" {
        Weight => "weight",
        Height => "height",
        LeanBodyMass => "lean_body_mass",
        FatPercentage => "fat_percentage",
    }
);

impl MetricType {
    /// The unit values of this metric are stored in.
    #[must_use]
    pub const fn canonical_unit(&self) -> Unit {
        match self {
            Self::Weight | Self::LeanBodyMass => Unit::Kilogram,
            Self::Height => Unit::Centimeter,
            Self::FatPercentage => Unit::Percent,
        }
    }

    /// Whether this is one of the two interconvertible body composition metrics.
    #[must_use]
    pub const fn is_body_composition(&self) -> bool {
        matches!(self, Self::LeanBodyMass | Self::FatPercentage)
    }
}

define_string_enum!(
    /// A unit attached to an externally sourced value.
    Unit, "unit" {
        Kilogram => "kg",
        Gram => "g",
        Pound => "lb",
        Stone => "st",
        Centimeter => "cm",
        Meter => "m",
        Inch => "in",
        Foot => "ft",
        Percent => "%",
        Fraction => "fraction",
    }
);

const GRAMS_PER_KILOGRAM: f64 = 1000.0;
const KILOGRAMS_PER_POUND: f64 = 0.453_592_37;
const KILOGRAMS_PER_STONE: f64 = 6.350_293_18;
const CENTIMETERS_PER_INCH: f64 = 2.54;
const CENTIMETERS_PER_FOOT: f64 = 30.48;

impl Unit {
    /// Converts `value` in this unit into the canonical unit of `metric`.
    ///
    /// Returns `None` if the unit does not measure the metric's dimension
    /// (e.g. a height reported in kilograms) or the value is not finite.
    #[must_use]
    pub fn to_canonical(self, metric: MetricType, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        match (metric, self) {
            (MetricType::Weight | MetricType::LeanBodyMass, Self::Kilogram)
            | (MetricType::Height, Self::Centimeter)
            | (MetricType::FatPercentage, Self::Percent) => Some(value),
            (MetricType::Weight | MetricType::LeanBodyMass, Self::Gram) => {
                Some(value / GRAMS_PER_KILOGRAM)
            }
            (MetricType::Weight | MetricType::LeanBodyMass, Self::Pound) => {
                Some(value * KILOGRAMS_PER_POUND)
            }
            (MetricType::Weight | MetricType::LeanBodyMass, Self::Stone) => {
                Some(value * KILOGRAMS_PER_STONE)
            }
            (MetricType::Height, Self::Meter) => Some(value * 100.0),
            (MetricType::Height, Self::Inch) => Some(value * CENTIMETERS_PER_INCH),
            (MetricType::Height, Self::Foot) => Some(value * CENTIMETERS_PER_FOOT),
            (MetricType::FatPercentage, Self::Fraction) => Some(value * 100.0),
            _ => None,
        }
    }
}
