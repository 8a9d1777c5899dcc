//! Recalculation of one day's derived state.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::adaptive::{self, History};
use crate::aggregate::AggregationSettings;
use crate::equation::{self, EquationInputs};
use crate::health::{
    ActiveEnergySource, Characteristics, Day, HealthDetails, Maintenance, MaintenanceSource,
    RestingEnergySource,
};
use crate::measurement::MeasurementSet;
use crate::metric::MetricType;
use crate::settings::Settings;

/// Values below this are treated as unchanged when comparing recomputed
/// equation results.
const VALUE_TOLERANCE: f64 = 1e-9;

/// The most recent known values, carried forward through the timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestKnown {
    pub characteristics: Characteristics,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub lean_body_mass_kg: Option<f64>,
}

impl LatestKnown {
    /// Folds a recalculated day into the map.
    pub fn fold(&mut self, day: &Day, values: &DailyValues) {
        self.characteristics = day.health_details.characteristics.or(&self.characteristics);
        self.weight_kg = values.weight_kg.or(self.weight_kg);
        self.height_cm = values.height_cm.or(self.height_cm);
        self.lean_body_mass_kg = values.lean_body_mass_kg.or(self.lean_body_mass_kg);
    }
}

/// A day's computed values. Derived on demand, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyValues {
    pub date: Option<NaiveDate>,
    pub age_years: Option<u32>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub lean_body_mass_kg: Option<f64>,
    pub fat_percentage: Option<f64>,
    pub resting_energy_kcal: Option<f64>,
    pub active_energy_kcal: Option<f64>,
    pub maintenance_kcal: Option<f64>,
}

impl DailyValues {
    /// Daily metric values of `details` under `aggregation`, without
    /// recalculating anything.
    ///
    /// A body composition metric without measurements takes the aggregate
    /// of the other metric's counterparts.
    pub fn observed(details: &HealthDetails, aggregation: &AggregationSettings) -> Self {
        let value = |metric: MetricType| details.measurements(metric).daily_value(aggregation.policy(metric));
        let counterpart = |metric: MetricType, other: MetricType| {
            details
                .measurements(other)
                .counterpart_value(aggregation.policy(metric))
        };
        let lean_body_mass_kg = if details.lean_body_mass.is_empty() {
            counterpart(MetricType::LeanBodyMass, MetricType::FatPercentage)
        } else {
            value(MetricType::LeanBodyMass)
        };
        let fat_percentage = if details.fat_percentage.is_empty() {
            counterpart(MetricType::FatPercentage, MetricType::LeanBodyMass)
        } else {
            value(MetricType::FatPercentage)
        };
        Self {
            weight_kg: value(MetricType::Weight),
            height_cm: value(MetricType::Height),
            lean_body_mass_kg,
            fat_percentage,
            resting_energy_kcal: details.resting_energy_kcal,
            active_energy_kcal: details.active_energy_kcal,
            maintenance_kcal: details.maintenance.as_ref().and_then(|m| m.kcal),
            ..Self::default()
        }
    }
}

fn recompute_equation_measurements(
    set: &mut MeasurementSet,
    metric: MetricType,
    inputs: &EquationInputs,
) {
    let mut dropped = Vec::new();
    for measurement in &mut set.measurements {
        let Some(equation) = measurement.equation() else {
            continue;
        };
        let Some(value) = equation.value_for(metric, inputs) else {
            dropped.push(measurement.id);
            continue;
        };
        if (value - measurement.value).abs() <= VALUE_TOLERANCE {
            continue;
        }
        if measurement.exported_as.is_some() {
            // The exported copy is stale: retire it and export anew.
            set.deleted_external.push(measurement.clone());
            measurement.exported_as = None;
            measurement.id = Uuid::new_v4();
        }
        tracing::debug!(%metric, %equation, old = measurement.value, new = value, "equation value changed");
        measurement.value = value;
    }
    for id in dropped {
        tracing::debug!(%metric, %id, "equation inputs missing, removing measurement");
        set.remove(id);
    }
}

fn cross_derive(details: &mut HealthDetails, weight_kg: Option<f64>) {
    for m in &mut details.lean_body_mass.measurements {
        m.counterpart =
            weight_kg.and_then(|w| equation::fat_percentage_from_lean_body_mass(m.value, w));
    }
    for m in &mut details.fat_percentage.measurements {
        m.counterpart =
            weight_kg.and_then(|w| equation::lean_body_mass_from_fat_percentage(m.value, w));
    }
}

/// Recalculates `day` in place and returns its daily values.
///
/// Steps run in a fixed order: carry-forward of characteristics, equation
/// measurements, cross-derivation, daily aggregates, resting and active
/// energy, adaptive maintenance, maintenance. Missing inputs yield `None`
/// and the remaining steps still run.
pub fn recalculate_day(
    day: &mut Day,
    latest: &LatestKnown,
    history: &History,
    settings: &Settings,
) -> DailyValues {
    let date = day.date;
    let aggregation = &settings.aggregation;
    let details = &mut day.health_details;

    details.resolved = details.characteristics.or(&latest.characteristics);
    let age_years = details
        .resolved
        .date_of_birth
        .and_then(|dob| equation::age_on(dob, date));
    let config = details.resolved.maintenance.clone().unwrap_or_default();

    let day_weight = details.weight.daily_value(aggregation.policy(MetricType::Weight));
    let day_height = details.height.daily_value(aggregation.policy(MetricType::Height));
    let mut inputs = EquationInputs {
        biological_sex: details.resolved.biological_sex,
        weight_kg: day_weight.or(latest.weight_kg),
        height_cm: day_height.or(latest.height_cm),
        age_years,
        lean_body_mass_kg: None,
    };

    recompute_equation_measurements(&mut details.lean_body_mass, MetricType::LeanBodyMass, &inputs);
    recompute_equation_measurements(&mut details.fat_percentage, MetricType::FatPercentage, &inputs);

    cross_derive(details, day_weight);

    let mut values = DailyValues::observed(details, aggregation);
    values.date = Some(date);
    values.age_years = age_years;
    inputs.lean_body_mass_kg = values.lean_body_mass_kg.or(latest.lean_body_mass_kg);

    if let RestingEnergySource::Equation { equation } = config.resting_energy {
        details.resting_energy_kcal = equation.calculate(&inputs);
    }
    if let ActiveEnergySource::ActivityLevel { level } = config.active_energy {
        details.active_energy_kcal = details
            .resting_energy_kcal
            .map(|resting| level.active_energy(resting));
    }
    values.resting_energy_kcal = details.resting_energy_kcal;
    values.active_energy_kcal = details.active_energy_kcal;

    let adaptive = adaptive::adaptive_maintenance(
        date,
        day_weight,
        &config,
        details.weight_change_override_kg,
        history,
    );
    let estimate_kcal = details
        .resting_energy_kcal
        .zip(details.active_energy_kcal)
        .map(|(resting, active)| resting + active);
    let (kcal, source) = match (adaptive.kcal, estimate_kcal) {
        (Some(kcal), _) => (Some(kcal), Some(MaintenanceSource::Adaptive)),
        (None, Some(estimate)) if config.use_estimate_as_fallback => {
            (Some(estimate), Some(MaintenanceSource::Estimate))
        }
        _ => (None, None),
    };
    details.maintenance = Some(Maintenance {
        estimate_kcal,
        adaptive,
        kcal,
        source,
    });
    values.maintenance_kcal = kcal;

    values
}
