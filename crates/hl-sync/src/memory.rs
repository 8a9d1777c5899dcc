//! An in-process external store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use hl_core::{ExportMeasurement, ExternalId, ExternalMeasurement, MetricType};

use crate::store::{
    CharacteristicKind, CharacteristicValue, DailyStatisticSeries, ExternalStore, StatisticKind,
    StoreError,
};

#[derive(Debug, Default)]
struct State {
    measurements: HashMap<MetricType, Vec<ExternalMeasurement>>,
    statistics: HashMap<StatisticKind, BTreeMap<NaiveDate, f64>>,
    characteristics: HashMap<CharacteristicKind, CharacteristicValue>,
    failing: HashSet<MetricType>,
    measurement_fetches: HashMap<MetricType, usize>,
    next_id: u64,
    export_batches: usize,
    delete_batches: usize,
}

/// External store kept in memory.
///
/// Exports are stored with a generated external ID and echo the exporting
/// measurement's local ID back, like a real store's export metadata.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a measurement as if recorded by another app.
    pub fn insert(&self, metric: MetricType, measurement: ExternalMeasurement) {
        self.state()
            .measurements
            .entry(metric)
            .or_default()
            .push(measurement);
    }

    pub fn set_statistic(&self, kind: StatisticKind, date: NaiveDate, kcal: f64) {
        self.state()
            .statistics
            .entry(kind)
            .or_default()
            .insert(date, kcal);
    }

    pub fn set_characteristic(&self, kind: CharacteristicKind, value: CharacteristicValue) {
        self.state().characteristics.insert(kind, value);
    }

    /// Makes fetches of `metric` fail as unavailable.
    pub fn fail_metric(&self, metric: MetricType) {
        self.state().failing.insert(metric);
    }

    /// Current measurements of `metric`.
    pub fn measurements(&self, metric: MetricType) -> Vec<ExternalMeasurement> {
        self.state()
            .measurements
            .get(&metric)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of times measurements of `metric` were fetched.
    pub fn measurement_fetches(&self, metric: MetricType) -> usize {
        self.state()
            .measurement_fetches
            .get(&metric)
            .copied()
            .unwrap_or_default()
    }

    /// Number of export calls received.
    pub fn export_batches(&self) -> usize {
        self.state().export_batches
    }

    /// Number of delete calls received.
    pub fn delete_batches(&self) -> usize {
        self.state().delete_batches
    }
}

#[async_trait]
impl ExternalStore for MemoryStore {
    async fn fetch_measurements(
        &self,
        metric: MetricType,
        since: NaiveDate,
    ) -> Result<Vec<ExternalMeasurement>, StoreError> {
        let mut state = self.state();
        *state.measurement_fetches.entry(metric).or_default() += 1;
        if state.failing.contains(&metric) {
            return Err(StoreError::Unavailable {
                reason: format!("{metric} is not readable"),
            });
        }
        Ok(state
            .measurements
            .get(&metric)
            .map(|list| {
                list.iter()
                    .filter(|m| m.timestamp.date_naive() >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_daily_statistic(
        &self,
        kind: StatisticKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DailyStatisticSeries, StoreError> {
        let values = self
            .state()
            .statistics
            .get(&kind)
            .map(|values| {
                values
                    .range(from..=to)
                    .map(|(date, kcal)| (*date, *kcal))
                    .collect()
            })
            .unwrap_or_default();
        Ok(DailyStatisticSeries { values })
    }

    async fn export_measurements(&self, exports: &[ExportMeasurement]) -> Result<(), StoreError> {
        let mut state = self.state();
        state.export_batches += 1;
        for export in exports {
            state.next_id += 1;
            let external_id = ExternalId::new(format!("mem-{}", state.next_id))
                .map_err(|err| StoreError::InvalidResponse(err.to_string()))?;
            state
                .measurements
                .entry(export.metric)
                .or_default()
                .push(ExternalMeasurement {
                    external_id,
                    timestamp: export.timestamp,
                    value: export.value,
                    unit: export.unit,
                    local_id: Some(export.local_id),
                });
        }
        Ok(())
    }

    async fn delete_measurements(&self, ids: &[ExternalId]) -> Result<(), StoreError> {
        let mut state = self.state();
        state.delete_batches += 1;
        for list in state.measurements.values_mut() {
            list.retain(|m| !ids.contains(&m.external_id));
        }
        Ok(())
    }

    async fn fetch_characteristic(
        &self,
        kind: CharacteristicKind,
    ) -> Result<Option<CharacteristicValue>, StoreError> {
        Ok(self.state().characteristics.get(&kind).copied())
    }
}
