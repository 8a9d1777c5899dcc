//! User-level settings read by the recalculators and the sync orchestrator.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationSettings;
use crate::metric::MetricType;

/// Which data is synchronized with the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct SyncSettings {
    #[serde(default = "enabled")]
    pub weight: bool,
    #[serde(default = "enabled")]
    pub height: bool,
    #[serde(default = "enabled")]
    pub lean_body_mass: bool,
    #[serde(default = "enabled")]
    pub fat_percentage: bool,
    #[serde(default = "enabled")]
    pub resting_energy: bool,
    #[serde(default = "enabled")]
    pub active_energy: bool,
    #[serde(default = "enabled")]
    pub dietary_energy: bool,
    #[serde(default = "enabled")]
    pub characteristics: bool,
}

const fn enabled() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            weight: true,
            height: true,
            lean_body_mass: true,
            fat_percentage: true,
            resting_energy: true,
            active_energy: true,
            dietary_energy: true,
            characteristics: true,
        }
    }
}

impl SyncSettings {
    /// Whether measurements of `metric` are synchronized.
    #[must_use]
    pub const fn metric(&self, metric: MetricType) -> bool {
        match metric {
            MetricType::Weight => self.weight,
            MetricType::Height => self.height,
            MetricType::LeanBodyMass => self.lean_body_mass,
            MetricType::FatPercentage => self.fat_percentage,
        }
    }

    pub const fn set_metric(&mut self, metric: MetricType, enabled: bool) {
        match metric {
            MetricType::Weight => self.weight = enabled,
            MetricType::Height => self.height = enabled,
            MetricType::LeanBodyMass => self.lean_body_mass = enabled,
            MetricType::FatPercentage => self.fat_percentage = enabled,
        }
    }
}

/// Settings for the whole log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// First day of the log. Recalculation and sync never look earlier.
    pub log_start_date: NaiveDate,

    /// Offset of the user's local time from UTC, used to assign timestamps
    /// to calendar days.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    #[serde(default)]
    pub aggregation: AggregationSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl Settings {
    pub fn new(log_start_date: NaiveDate) -> Self {
        Self {
            log_start_date,
            utc_offset_minutes: 0,
            aggregation: AggregationSettings::default(),
            sync: SyncSettings::default(),
        }
    }

    /// The local calendar day `timestamp` falls on.
    #[must_use]
    pub fn local_date(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        (timestamp + Duration::minutes(i64::from(self.utc_offset_minutes))).date_naive()
    }

    /// Metrics whose measurements are synchronized, in declaration order.
    pub fn synced_metrics(&self) -> Vec<MetricType> {
        MetricType::ALL
            .iter()
            .copied()
            .filter(|metric| self.sync.metric(*metric))
            .collect()
    }
}
