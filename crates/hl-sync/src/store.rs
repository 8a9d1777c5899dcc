//! The external health store contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use hl_core::{BiologicalSex, ExportMeasurement, ExternalId, ExternalMeasurement, MetricType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused access or cannot be reached at all.
    #[error("external store unavailable: {reason}")]
    Unavailable { reason: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The store answered with an error status.
    #[error("external store returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A day-level energy statistic kept by the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    RestingEnergy,
    ActiveEnergy,
    DietaryEnergy,
}

impl StatisticKind {
    pub const ALL: [Self; 3] = [Self::RestingEnergy, Self::ActiveEnergy, Self::DietaryEnergy];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RestingEnergy => "resting_energy",
            Self::ActiveEnergy => "active_energy",
            Self::DietaryEnergy => "dietary_energy",
        }
    }
}

/// Cumulative kcal per calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyStatisticSeries {
    #[serde(default)]
    pub values: BTreeMap<NaiveDate, f64>,
}

/// A characteristic the external store may know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicKind {
    BiologicalSex,
    DateOfBirth,
}

impl CharacteristicKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BiologicalSex => "biological_sex",
            Self::DateOfBirth => "date_of_birth",
        }
    }
}

/// A characteristic value read from the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicValue {
    BiologicalSex(BiologicalSex),
    DateOfBirth(NaiveDate),
}

impl CharacteristicValue {
    /// Parses the wire form of a `kind` characteristic.
    pub fn parse(kind: CharacteristicKind, value: &str) -> Result<Self, StoreError> {
        match kind {
            CharacteristicKind::BiologicalSex => value
                .parse()
                .map(Self::BiologicalSex)
                .map_err(|err: hl_core::ValidationError| StoreError::InvalidResponse(err.to_string())),
            CharacteristicKind::DateOfBirth => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(Self::DateOfBirth)
                .map_err(|err| StoreError::InvalidResponse(format!("date of birth: {err}"))),
        }
    }
}

/// The external health store.
///
/// Implementations must be shareable across tasks; the orchestrator issues
/// fetches for several metrics concurrently.
#[async_trait]
pub trait ExternalStore: Send + Sync {
    /// Measurements of `metric` taken on or after `since`.
    async fn fetch_measurements(
        &self,
        metric: MetricType,
        since: NaiveDate,
    ) -> Result<Vec<ExternalMeasurement>, StoreError>;

    /// Daily totals of `kind` between `from` and `to`, inclusive.
    async fn fetch_daily_statistic(
        &self,
        kind: StatisticKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DailyStatisticSeries, StoreError>;

    /// Writes local measurements. Each export carries its local ID so the
    /// store can echo it back.
    async fn export_measurements(&self, exports: &[ExportMeasurement]) -> Result<(), StoreError>;

    async fn delete_measurements(&self, ids: &[ExternalId]) -> Result<(), StoreError>;

    async fn fetch_characteristic(
        &self,
        kind: CharacteristicKind,
    ) -> Result<Option<CharacteristicValue>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_characteristics() {
        assert_eq!(
            CharacteristicValue::parse(CharacteristicKind::BiologicalSex, "female").unwrap(),
            CharacteristicValue::BiologicalSex(BiologicalSex::Female)
        );
        assert_eq!(
            CharacteristicValue::parse(CharacteristicKind::DateOfBirth, "1990-06-15").unwrap(),
            CharacteristicValue::DateOfBirth(NaiveDate::from_ymd_opt(1990, 6, 15).unwrap())
        );
        assert!(CharacteristicValue::parse(CharacteristicKind::DateOfBirth, "June").is_err());
    }

    #[test]
    fn statistic_series_uses_date_keys() {
        let series: DailyStatisticSeries =
            serde_json::from_str(r#"{"values": {"2025-03-01": 1850.5}}"#).unwrap();
        assert_eq!(
            series.values.get(&NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()),
            Some(&1850.5)
        );
    }
}
