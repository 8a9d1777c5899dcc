//! Bidirectional sync between the local day store and the external store.
//!
//! A sync fetches everything it needs concurrently, reconciles each day
//! against it, writes deletions and exports back in one batch each and
//! finishes with a timeline pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::join_all;
use hl_core::timeline::synced_fields_differ;
use hl_core::{
    ActiveEnergySource, Day, DayStore, DietaryEnergyPoint, DietaryEnergySource,
    ExportMeasurement, ExternalId, ExternalMeasurement, MaintenanceConfig, MetricType,
    RestingEnergySource, Settings, TimelineReport, reconcile, run_timeline,
};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::cancel::CancelToken;
use crate::store::{
    CharacteristicKind, CharacteristicValue, DailyStatisticSeries, ExternalStore, StatisticKind,
};

/// Sync errors. External store failures are not among them: they degrade
/// to missing data and are counted in the [`SyncReport`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local day store failed.
    #[error("local store error: {0}")]
    Local(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// No settings have been saved yet.
    #[error("log is not initialized; run `hl init` first")]
    NotInitialized,
    /// The sync was cancelled by its scope.
    #[error("sync cancelled")]
    Cancelled,
    /// A background task panicked.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub fn local<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Local(Box::new(err))
    }
}

/// What a sync did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub imported: usize,
    pub removed: usize,
    pub exported: usize,
    pub deleted_externally: usize,
    pub echoes_recorded: usize,
    pub days_saved: usize,
    pub failed_fetches: usize,
    pub failed_writes: usize,
    #[serde(skip)]
    pub timeline: TimelineReport,
}

#[derive(Debug, Default)]
struct Fetched {
    /// Only metrics whose fetch succeeded; the others are not reconciled.
    measurements: Vec<(MetricType, Vec<ExternalMeasurement>)>,
    statistics: Vec<(StatisticKind, DailyStatisticSeries)>,
    characteristics: Vec<CharacteristicValue>,
    failed: usize,
}

#[derive(Debug)]
struct DayOutcome {
    original: Option<Day>,
    day: Day,
    imported: usize,
    removed: usize,
    echoes_recorded: usize,
    to_delete_external: Vec<ExternalId>,
    to_export: Vec<ExportMeasurement>,
}

type ExternalByDay = BTreeMap<NaiveDate, HashMap<MetricType, Vec<ExternalMeasurement>>>;

fn reconcile_day(original: Option<Day>, date: NaiveDate, metrics: &[MetricType], external: &ExternalByDay) -> DayOutcome {
    let mut day = original.clone().unwrap_or_else(|| Day::new(date));
    let mut outcome = DayOutcome {
        original,
        day: Day::new(date),
        imported: 0,
        removed: 0,
        echoes_recorded: 0,
        to_delete_external: Vec::new(),
        to_export: Vec::new(),
    };
    let for_day = external.get(&date);
    for metric in metrics {
        let records = for_day
            .and_then(|by_metric| by_metric.get(metric))
            .map_or(&[][..], Vec::as_slice);
        let result = reconcile(day.health_details.measurements(*metric), *metric, records);
        outcome.imported += result.imported;
        outcome.removed += result.removed;
        outcome.echoes_recorded += result.echoes_recorded;
        outcome.to_delete_external.extend(result.to_delete_external);
        outcome.to_export.extend(result.to_export);
        *day.health_details.measurements_mut(*metric) = result.set;
    }
    outcome.day = day;
    outcome
}

/// Applies one day's statistic. `config` is the maintenance configuration
/// in effect on the day, which may not be resolved on the day itself yet.
fn apply_statistic(day: &mut Day, config: &MaintenanceConfig, kind: StatisticKind, kcal: f64) {
    let details = &mut day.health_details;
    match kind {
        StatisticKind::RestingEnergy => {
            if config.resting_energy == RestingEnergySource::ExternalSync {
                details.resting_energy_kcal = Some(kcal);
            }
        }
        StatisticKind::ActiveEnergy => {
            if config.active_energy == ActiveEnergySource::ExternalSync {
                details.active_energy_kcal = Some(kcal);
            }
        }
        StatisticKind::DietaryEnergy => {
            let replaceable = day
                .dietary_energy_point
                .as_ref()
                .is_none_or(|point| point.source == DietaryEnergySource::ExternalSync);
            if replaceable {
                day.dietary_energy_point = Some(DietaryEnergyPoint::new(
                    day.date,
                    Some(kcal),
                    DietaryEnergySource::ExternalSync,
                ));
            }
        }
    }
}

fn apply_characteristic(day: &mut Day, value: CharacteristicValue) {
    let details = &mut day.health_details;
    match value {
        CharacteristicValue::BiologicalSex(sex) => {
            if details.characteristics.biological_sex.is_none()
                && details.resolved.biological_sex != Some(sex)
            {
                details.characteristics.biological_sex = Some(sex);
            }
        }
        CharacteristicValue::DateOfBirth(dob) => {
            if details.characteristics.date_of_birth.is_none()
                && details.resolved.date_of_birth != Some(dob)
            {
                details.characteristics.date_of_birth = Some(dob);
            }
        }
    }
}

const fn statistic_enabled(settings: &Settings, kind: StatisticKind) -> bool {
    match kind {
        StatisticKind::RestingEnergy => settings.sync.resting_energy,
        StatisticKind::ActiveEnergy => settings.sync.active_energy,
        StatisticKind::DietaryEnergy => settings.sync.dietary_energy,
    }
}

/// Runs syncs against one external store.
pub struct SyncOrchestrator<E: ?Sized> {
    store: Arc<E>,
}

impl<E: ExternalStore + ?Sized> SyncOrchestrator<E> {
    pub const fn new(store: Arc<E>) -> Self {
        Self { store }
    }

    async fn fetch(&self, settings: &Settings, today: NaiveDate) -> Fetched {
        let since = settings.log_start_date;
        let store = &self.store;

        let measurement_fetches = join_all(settings.synced_metrics().into_iter().map(|metric| async move {
            (metric, store.fetch_measurements(metric, since).await)
        }));
        let statistic_fetches = join_all(
            StatisticKind::ALL
                .into_iter()
                .filter(|kind| statistic_enabled(settings, *kind))
                .map(|kind| async move { (kind, store.fetch_daily_statistic(kind, since, today).await) }),
        );
        let characteristic_kinds = if settings.sync.characteristics {
            vec![CharacteristicKind::BiologicalSex, CharacteristicKind::DateOfBirth]
        } else {
            Vec::new()
        };
        let characteristic_fetches = join_all(
            characteristic_kinds
                .into_iter()
                .map(|kind| async move { (kind, store.fetch_characteristic(kind).await) }),
        );

        let (measurements, statistics, characteristics) =
            tokio::join!(measurement_fetches, statistic_fetches, characteristic_fetches);

        let mut fetched = Fetched::default();
        for (metric, result) in measurements {
            match result {
                Ok(list) => fetched.measurements.push((metric, list)),
                Err(err) => {
                    tracing::warn!(%metric, error = %err, "fetching measurements failed");
                    fetched.failed += 1;
                }
            }
        }
        for (kind, result) in statistics {
            match result {
                Ok(series) => fetched.statistics.push((kind, series)),
                Err(err) => {
                    tracing::warn!(kind = kind.as_str(), error = %err, "fetching statistic failed");
                    fetched.failed += 1;
                }
            }
        }
        for (kind, result) in characteristics {
            match result {
                Ok(Some(value)) => fetched.characteristics.push(value),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(kind = kind.as_str(), error = %err, "fetching characteristic failed");
                    fetched.failed += 1;
                }
            }
        }
        fetched
    }

    /// Syncs every day from the log start through `today`.
    pub async fn sync<S>(
        &self,
        local: &Arc<Mutex<S>>,
        today: NaiveDate,
        cancel: &CancelToken,
    ) -> Result<SyncReport, SyncError>
    where
        S: DayStore + Send + 'static,
    {
        let settings = local
            .lock()
            .await
            .fetch_settings()
            .map_err(SyncError::local)?
            .ok_or(SyncError::NotInitialized)?;
        let start = settings.log_start_date;

        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
            fetched = self.fetch(&settings, today) => fetched,
        };
        let mut report = SyncReport {
            failed_fetches: fetched.failed,
            ..SyncReport::default()
        };

        let mut external = ExternalByDay::new();
        let mut metrics = Vec::new();
        for (metric, list) in fetched.measurements {
            metrics.push(metric);
            for record in list {
                let date = settings.local_date(record.timestamp);
                if date < start || date > today {
                    tracing::debug!(%metric, %date, "external measurement outside log range");
                    continue;
                }
                external
                    .entry(date)
                    .or_default()
                    .entry(metric)
                    .or_default()
                    .push(record);
            }
        }

        let mut needed: BTreeSet<NaiveDate> = external.keys().copied().collect();
        for (_, series) in &fetched.statistics {
            needed.extend(series.values.keys().filter(|d| (start..=today).contains(*d)));
        }
        if !fetched.characteristics.is_empty() && today >= start {
            needed.insert(today);
        }

        let mut db = local.lock().await;

        let mut stored: BTreeMap<NaiveDate, Day> = db
            .fetch_days(start, today)
            .map_err(SyncError::local)?
            .into_iter()
            .map(|day| (day.date, day))
            .collect();
        let dates: BTreeSet<NaiveDate> = stored.keys().copied().chain(needed).collect();
        let loaded: Vec<(NaiveDate, Option<Day>)> = dates
            .into_iter()
            .map(|date| (date, stored.remove(&date)))
            .collect();

        let mut outcomes = tokio::task::spawn_blocking(move || {
            loaded
                .into_par_iter()
                .map(|(date, stored)| reconcile_day(stored, date, &metrics, &external))
                .collect::<Vec<_>>()
        })
        .await?;

        let index: HashMap<NaiveDate, usize> = outcomes
            .iter()
            .enumerate()
            .map(|(i, outcome)| (outcome.day.date, i))
            .collect();
        // Every stored day is loaded, so folding the explicit configs in
        // date order gives each day the one the timeline would resolve.
        let mut carried: Option<MaintenanceConfig> = None;
        let configs: Vec<MaintenanceConfig> = outcomes
            .iter()
            .map(|outcome| {
                if let Some(config) = &outcome.day.health_details.characteristics.maintenance {
                    carried = Some(config.clone());
                }
                carried.clone().unwrap_or_default()
            })
            .collect();
        for (kind, series) in &fetched.statistics {
            for (date, kcal) in &series.values {
                if let Some(&i) = index.get(date) {
                    apply_statistic(&mut outcomes[i].day, &configs[i], *kind, *kcal);
                }
            }
        }
        if let Some(&i) = index.get(&today) {
            for value in &fetched.characteristics {
                apply_characteristic(&mut outcomes[i].day, *value);
            }
        }

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let mut to_delete = Vec::new();
        let mut to_export = Vec::new();
        let mut changed = Vec::new();
        for outcome in outcomes {
            report.imported += outcome.imported;
            report.removed += outcome.removed;
            report.echoes_recorded += outcome.echoes_recorded;
            to_delete.extend(outcome.to_delete_external);
            to_export.extend(outcome.to_export);
            if outcome.original.as_ref() != Some(&outcome.day) {
                changed.push(outcome.day);
            }
        }
        db.save_days(&changed).map_err(SyncError::local)?;
        report.days_saved = changed.len();
        drop(db);

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        if !to_delete.is_empty() {
            match self.store.delete_measurements(&to_delete).await {
                Ok(()) => report.deleted_externally = to_delete.len(),
                Err(err) => {
                    tracing::warn!(count = to_delete.len(), error = %err, "deleting external measurements failed");
                    report.failed_writes += 1;
                }
            }
        }
        if !to_export.is_empty() {
            match self.store.export_measurements(&to_export).await {
                Ok(()) => report.exported = to_export.len(),
                Err(err) => {
                    tracing::warn!(count = to_export.len(), error = %err, "exporting measurements failed");
                    report.failed_writes += 1;
                }
            }
        }

        let mut db = Arc::clone(local).lock_owned().await;
        let pass_cancel = cancel.clone();
        report.timeline = tokio::task::spawn_blocking(move || {
            run_timeline(&mut *db, &settings, today, || pass_cancel.is_cancelled())
        })
        .await?
        .map_err(SyncError::local)?;
        if report.timeline.cancelled {
            return Err(SyncError::Cancelled);
        }

        tracing::info!(
            imported = report.imported,
            removed = report.removed,
            exported = report.exported,
            deleted = report.deleted_externally,
            days_saved = report.days_saved,
            failed_fetches = report.failed_fetches,
            "sync finished"
        );
        Ok(report)
    }
}

/// Whether a user edit from `before` to `after` needs a sync.
pub fn edit_needs_sync(before: Option<&Day>, after: &Day, settings: &Settings) -> bool {
    let empty = Day::new(after.date);
    let before = before.unwrap_or(&empty);
    if synced_fields_differ(before, after, settings) {
        return true;
    }
    let characteristics_changed = settings.sync.characteristics
        && (before.health_details.characteristics.biological_sex
            != after.health_details.characteristics.biological_sex
            || before.health_details.characteristics.date_of_birth
                != after.health_details.characteristics.date_of_birth);
    let dietary_changed =
        settings.sync.dietary_energy && before.dietary_energy_point != after.dietary_energy_point;
    characteristics_changed || dietary_changed
}
