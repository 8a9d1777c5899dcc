//! Reduction of a day's measurements into a single daily value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::measurement::Measurement;
use crate::metric::MetricType;
use crate::types::define_string_enum;

define_string_enum!(
    /// How a day's measurements of one metric reduce to its daily value.
    AggregationPolicy, "aggregation policy" {
        Average => "average",
        First => "first",
        Last => "last",
    }
);

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self::Last
    }
}

/// Reduces measurement values under `policy`.
///
/// `first` and `last` pick by timestamp; among equal timestamps `first`
/// keeps the earliest position in the slice and `last` the latest.
pub fn reduce(measurements: &[Measurement], policy: AggregationPolicy) -> Option<f64> {
    reduce_by(measurements, policy, |measurement| Some(measurement.value))
}

/// Like [`reduce`], but reduces whatever `value` extracts from each
/// measurement, skipping measurements for which it returns `None`.
pub fn reduce_by<F>(measurements: &[Measurement], policy: AggregationPolicy, value: F) -> Option<f64>
where
    F: Fn(&Measurement) -> Option<f64>,
{
    let values = measurements
        .iter()
        .filter_map(|measurement| value(measurement).map(|v| (measurement.date_time, v)));
    match policy {
        AggregationPolicy::Average => {
            let (sum, count) = values.fold((0.0, 0u32), |(sum, count), (_, v)| (sum + v, count + 1));
            (count > 0).then(|| sum / f64::from(count))
        }
        AggregationPolicy::First => pick(values, |candidate, best| candidate < best),
        AggregationPolicy::Last => pick(values, |candidate, best| candidate >= best),
    }
}

fn pick<I, F>(values: I, replaces: F) -> Option<f64>
where
    I: Iterator<Item = (DateTime<Utc>, f64)>,
    F: Fn(DateTime<Utc>, DateTime<Utc>) -> bool,
{
    let mut best: Option<(DateTime<Utc>, f64)> = None;
    for (timestamp, value) in values {
        if best.is_none_or(|(best_timestamp, _)| replaces(timestamp, best_timestamp)) {
            best = Some((timestamp, value));
        }
    }
    best.map(|(_, value)| value)
}

/// Per-metric aggregation policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSettings {
    #[serde(default)]
    pub weight: AggregationPolicy,
    #[serde(default)]
    pub height: AggregationPolicy,
    #[serde(default)]
    pub lean_body_mass: AggregationPolicy,
    #[serde(default)]
    pub fat_percentage: AggregationPolicy,
}

impl AggregationSettings {
    /// The policy configured for `metric`.
    #[must_use]
    pub const fn policy(&self, metric: MetricType) -> AggregationPolicy {
        match metric {
            MetricType::Weight => self.weight,
            MetricType::Height => self.height,
            MetricType::LeanBodyMass => self.lean_body_mass,
            MetricType::FatPercentage => self.fat_percentage,
        }
    }

    /// Sets the policy for `metric`.
    pub const fn set_policy(&mut self, metric: MetricType, policy: AggregationPolicy) {
        match metric {
            MetricType::Weight => self.weight = policy,
            MetricType::Height => self.height = policy,
            MetricType::LeanBodyMass => self.lean_body_mass = policy,
            MetricType::FatPercentage => self.fat_percentage = policy,
        }
    }
}
