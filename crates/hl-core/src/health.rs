//! Per-day health records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::equation::{ActivityLevel, RestingEnergyEquation};
use crate::measurement::MeasurementSet;
use crate::metric::MetricType;
use crate::types::{BiologicalSex, PregnancyStatus, SmokingStatus, ValidationError};

/// Smallest and largest allowed adaptive maintenance window, in days.
pub const WINDOW_DAYS_RANGE: (u32, u32) = (1, 28);

/// Smallest and largest allowed weight moving average span, in days.
pub const MOVING_AVERAGE_DAYS_RANGE: (u32, u32) = (2, 7);

/// Non-temporal characteristics. An unset field on a day inherits the most
/// recent earlier value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biological_sex: Option<BiologicalSex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoking_status: Option<SmokingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<MaintenanceConfig>,
}

impl Characteristics {
    /// Fieldwise `self`, falling back to `fallback` where unset.
    #[must_use]
    pub fn or(&self, fallback: &Self) -> Self {
        Self {
            date_of_birth: self.date_of_birth.or(fallback.date_of_birth),
            biological_sex: self.biological_sex.or(fallback.biological_sex),
            smoking_status: self.smoking_status.or(fallback.smoking_status),
            maintenance: self
                .maintenance
                .clone()
                .or_else(|| fallback.maintenance.clone()),
        }
    }

    /// Whether no characteristic is set.
    pub const fn is_empty(&self) -> bool {
        self.date_of_birth.is_none()
            && self.biological_sex.is_none()
            && self.smoking_status.is_none()
            && self.maintenance.is_none()
    }
}

/// Where a day's resting energy comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RestingEnergySource {
    Equation { equation: RestingEnergyEquation },
    Manual,
    ExternalSync,
}

/// Where a day's active energy comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActiveEnergySource {
    ActivityLevel { level: ActivityLevel },
    Manual,
    ExternalSync,
}

/// Baseline maintenance configuration, carried forward like other
/// characteristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    pub resting_energy: RestingEnergySource,
    pub active_energy: ActiveEnergySource,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_moving_average_days: Option<u32>,
    #[serde(default = "default_true")]
    pub use_estimate_as_fallback: bool,
}

const fn default_window_days() -> u32 {
    7
}

const fn default_true() -> bool {
    true
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            resting_energy: RestingEnergySource::Equation {
                equation: RestingEnergyEquation::MifflinStJeor,
            },
            active_energy: ActiveEnergySource::ActivityLevel {
                level: ActivityLevel::Sedentary,
            },
            window_days: default_window_days(),
            weight_moving_average_days: None,
            use_estimate_as_fallback: true,
        }
    }
}

impl MaintenanceConfig {
    /// Checks the window and moving average spans.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("window days", self.window_days, WINDOW_DAYS_RANGE)?;
        if let Some(days) = self.weight_moving_average_days {
            check_range("moving average days", days, MOVING_AVERAGE_DAYS_RANGE)?;
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

/// How a day's dietary energy was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietaryEnergySource {
    Log,
    ExternalSync,
    FastedZero,
    ManualEntry,
    /// Left out of both numerator and denominator of the window average.
    ExcludedUseAverage,
}

/// One day's dietary energy intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietaryEnergyPoint {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kcal: Option<f64>,
    pub source: DietaryEnergySource,
}

impl DietaryEnergyPoint {
    pub const fn new(date: NaiveDate, kcal: Option<f64>, source: DietaryEnergySource) -> Self {
        Self { date, kcal, source }
    }

    /// The intake this point contributes to a window average, or `None` if
    /// it is excluded.
    #[must_use]
    pub fn counted_kcal(&self) -> Option<f64> {
        match self.source {
            DietaryEnergySource::ExcludedUseAverage => None,
            DietaryEnergySource::FastedZero => Some(0.0),
            _ => self.kcal,
        }
    }
}

/// A dietary energy point as shown in a maintenance window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPoint {
    pub date: NaiveDate,
    pub kcal: Option<f64>,
    pub source: DietaryEnergySource,
}

/// The dietary energy window preceding a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietaryEnergyWindow {
    pub points: Vec<WindowPoint>,
    pub kcal_per_day: Option<f64>,
}

/// Weight points averaged into a moving-average endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub days: u32,
    pub points: Vec<(NaiveDate, f64)>,
}

/// One endpoint of a weight change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightChangePoint {
    pub date: NaiveDate,
    pub kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moving_average: Option<MovingAverage>,
}

/// Weight change over a maintenance window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightChange {
    Manual {
        kg: f64,
    },
    Points {
        start: WeightChangePoint,
        end: WeightChangePoint,
        kg: Option<f64>,
    },
}

impl WeightChange {
    pub const fn kg(&self) -> Option<f64> {
        match self {
            Self::Manual { kg } => Some(*kg),
            Self::Points { kg, .. } => *kg,
        }
    }
}

/// Maintenance derived from energy balance over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveMaintenance {
    pub dietary_energy: DietaryEnergyWindow,
    pub weight_change: WeightChange,
    pub kcal: Option<f64>,
}

/// Which value a day's maintenance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceSource {
    Adaptive,
    Estimate,
}

/// The computed maintenance result for a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintenance {
    /// Resting plus active energy.
    pub estimate_kcal: Option<f64>,
    pub adaptive: AdaptiveMaintenance,
    pub kcal: Option<f64>,
    pub source: Option<MaintenanceSource>,
}

/// Everything recorded and derived for one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthDetails {
    /// Characteristics explicitly set on this day.
    #[serde(default, skip_serializing_if = "Characteristics::is_empty")]
    pub characteristics: Characteristics,

    /// Characteristics in effect on this day after carry-forward.
    #[serde(default, skip_serializing_if = "Characteristics::is_empty")]
    pub resolved: Characteristics,

    #[serde(default)]
    pub weight: MeasurementSet,
    #[serde(default)]
    pub height: MeasurementSet,
    #[serde(default)]
    pub lean_body_mass: MeasurementSet,
    #[serde(default)]
    pub fat_percentage: MeasurementSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pregnancy_status: Option<PregnancyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resting_energy_kcal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_energy_kcal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_change_override_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Maintenance>,
}

impl HealthDetails {
    pub const fn measurements(&self, metric: MetricType) -> &MeasurementSet {
        match metric {
            MetricType::Weight => &self.weight,
            MetricType::Height => &self.height,
            MetricType::LeanBodyMass => &self.lean_body_mass,
            MetricType::FatPercentage => &self.fat_percentage,
        }
    }

    pub const fn measurements_mut(&mut self, metric: MetricType) -> &mut MeasurementSet {
        match metric {
            MetricType::Weight => &mut self.weight,
            MetricType::Height => &mut self.height,
            MetricType::LeanBodyMass => &mut self.lean_body_mass,
            MetricType::FatPercentage => &mut self.fat_percentage,
        }
    }
}

/// A calendar day and its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub date: NaiveDate,
    #[serde(default)]
    pub health_details: HealthDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_energy_point: Option<DietaryEnergyPoint>,
}

impl Day {
    /// An empty day.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            health_details: HealthDetails::default(),
            dietary_energy_point: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn characteristics_or_prefers_explicit_values() {
        let explicit = Characteristics {
            biological_sex: Some(BiologicalSex::Female),
            ..Characteristics::default()
        };
        let latest = Characteristics {
            biological_sex: Some(BiologicalSex::Male),
            date_of_birth: Some(date(1)),
            ..Characteristics::default()
        };
        let resolved = explicit.or(&latest);
        assert_eq!(resolved.biological_sex, Some(BiologicalSex::Female));
        assert_eq!(resolved.date_of_birth, Some(date(1)));
        assert!(resolved.smoking_status.is_none());
    }

    #[test]
    fn fasted_counts_as_zero_and_excluded_is_skipped() {
        let fasted = DietaryEnergyPoint::new(date(1), None, DietaryEnergySource::FastedZero);
        let excluded =
            DietaryEnergyPoint::new(date(2), Some(2500.0), DietaryEnergySource::ExcludedUseAverage);
        let logged = DietaryEnergyPoint::new(date(3), Some(2100.0), DietaryEnergySource::Log);
        assert_eq!(fasted.counted_kcal(), Some(0.0));
        assert_eq!(excluded.counted_kcal(), None);
        assert_eq!(logged.counted_kcal(), Some(2100.0));
    }

    #[test]
    fn maintenance_config_validates_ranges() {
        let mut config = MaintenanceConfig::default();
        assert!(config.validate().is_ok());

        config.window_days = 29;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "window days must be between 1 and 28, got 29"
        );

        config.window_days = 14;
        config.weight_moving_average_days = Some(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn maintenance_config_fills_defaults_when_deserializing() {
        let json = r#"{
            "resting_energy": {"kind": "equation", "equation": "katch_mcardle"},
            "active_energy": {"kind": "manual"}
        }"#;
        let config: MaintenanceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.window_days, 7);
        assert!(config.use_estimate_as_fallback);
        assert_eq!(config.active_energy, ActiveEnergySource::Manual);
    }

    #[test]
    fn empty_day_serializes_compactly() {
        let day = Day::new(date(4));
        let json = serde_json::to_string(&day).unwrap();
        assert_eq!(
            json,
            r#"{"date":"2025-03-04","health_details":{"weight":{},"height":{},"lean_body_mass":{},"fat_percentage":{}}}"#
        );
    }
}
