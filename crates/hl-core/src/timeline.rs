//! Recalculation of every day from the log start to today.

use chrono::{Duration, NaiveDate};

use crate::adaptive::{HISTORY_SPAN_DAYS, History, HistoryEntry};
use crate::health::Day;
use crate::recalc::{DailyValues, LatestKnown, recalculate_day};
use crate::settings::Settings;

/// Local persistence of days and settings.
pub trait DayStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The stored day for `date`, without creating it.
    fn fetch_day(&self, date: NaiveDate) -> Result<Option<Day>, Self::Error>;

    /// The stored day for `date`, created empty on first access.
    fn fetch_or_create_day(&mut self, date: NaiveDate) -> Result<Day, Self::Error>;

    /// Replaces the stored day.
    fn save_day(&mut self, day: &Day) -> Result<(), Self::Error>;

    /// Stored days from `from` through `to`, ascending. Dates without a
    /// stored day are skipped.
    fn fetch_days(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Day>, Self::Error> {
        let mut days = Vec::new();
        let mut date = from;
        while date <= to {
            days.extend(self.fetch_day(date)?);
            let Some(next) = date.succ_opt() else {
                break;
            };
            date = next;
        }
        Ok(days)
    }

    /// Replaces several stored days.
    fn save_days(&mut self, days: &[Day]) -> Result<(), Self::Error> {
        days.iter().try_for_each(|day| self.save_day(day))
    }

    fn fetch_settings(&self) -> Result<Option<Settings>, Self::Error>;

    fn save_settings(&mut self, settings: &Settings) -> Result<(), Self::Error>;
}

/// Outcome of a timeline pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineReport {
    pub days_visited: usize,
    pub days_saved: usize,
    /// Whether any saved day changed what the external store sees of a
    /// sync-enabled metric.
    pub synced_fields_changed: bool,
    pub cancelled: bool,
}

/// Whether `before` and `after` differ in a field that is synchronized with
/// the external store. Values derived locally, such as body composition
/// counterparts, do not count.
pub fn synced_fields_differ(before: &Day, after: &Day, settings: &Settings) -> bool {
    settings.synced_metrics().into_iter().any(|metric| {
        !before
            .health_details
            .measurements(metric)
            .same_synced_state(after.health_details.measurements(metric))
    })
}

/// State carried from one day to the next while walking the timeline.
#[derive(Debug, Default)]
pub struct TimelineState {
    latest: LatestKnown,
    history: History,
}

impl TimelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recalculates `day` with the state accumulated so far, then folds it
    /// in for the days that follow.
    pub fn recalculate(&mut self, day: &mut Day, settings: &Settings) -> DailyValues {
        let values = recalculate_day(day, &self.latest, &self.history, settings);
        self.advance(day, &values);
        values
    }

    /// Folds an already recalculated day into the state.
    pub fn advance(&mut self, day: &Day, values: &DailyValues) {
        self.latest.fold(day, values);
        self.history.record(
            day.date,
            HistoryEntry {
                weight_kg: values.weight_kg,
                dietary_energy_point: day.dietary_energy_point.clone(),
            },
        );
        if let Some(next) = day.date.succ_opt() {
            self.history.prune_for(next);
        }
    }

    /// Rebuilds the state in effect just before `date` from stored days.
    ///
    /// Characteristics come from the most recent stored day's resolved
    /// values; weights and dietary points from the days the history reaches.
    pub fn before<S: DayStore>(
        store: &S,
        settings: &Settings,
        date: NaiveDate,
    ) -> Result<Self, S::Error> {
        let mut state = Self::new();
        let start = settings.log_start_date;
        if date <= start {
            return Ok(state);
        }

        let history_start = (date - Duration::days(HISTORY_SPAN_DAYS)).max(start);
        let Some(last) = date.pred_opt() else {
            return Ok(state);
        };
        for day in store.fetch_days(start, last)? {
            let values = DailyValues::observed(&day.health_details, &settings.aggregation);
            state.latest.characteristics = day
                .health_details
                .resolved
                .or(&day.health_details.characteristics)
                .or(&state.latest.characteristics);
            state.latest.fold(&day, &values);
            if day.date >= history_start {
                state.history.record(
                    day.date,
                    HistoryEntry {
                        weight_kg: values.weight_kg,
                        dietary_energy_point: day.dietary_energy_point.clone(),
                    },
                );
            }
        }
        Ok(state)
    }
}

/// Recalculates only `date`, using state rebuilt from the stored days
/// before it, and saves it if its details changed.
///
/// Returns the recalculated day and whether a synced field changed.
pub fn recalculate_date<S: DayStore>(
    store: &mut S,
    settings: &Settings,
    date: NaiveDate,
) -> Result<(Day, DailyValues, bool), S::Error> {
    let mut state = TimelineState::before(store, settings, date)?;
    let original = store.fetch_or_create_day(date)?;
    let mut day = original.clone();
    let values = state.recalculate(&mut day, settings);
    let mut synced_changed = false;
    if day.health_details != original.health_details {
        synced_changed = synced_fields_differ(&original, &day, settings);
        store.save_day(&day)?;
        tracing::debug!(%date, synced_changed, "saved recalculated day");
    }
    Ok((day, values, synced_changed))
}

/// Recalculates every day from the log start through `today`.
///
/// Only days whose details changed are saved. `is_cancelled` is checked
/// between days; a cancelled pass keeps what it already saved and can be
/// rerun from the start.
pub fn run_timeline<S, F>(
    store: &mut S,
    settings: &Settings,
    today: NaiveDate,
    is_cancelled: F,
) -> Result<TimelineReport, S::Error>
where
    S: DayStore,
    F: Fn() -> bool,
{
    let mut report = TimelineReport::default();
    let mut state = TimelineState::new();
    let mut date = settings.log_start_date;

    while date <= today {
        if is_cancelled() {
            tracing::info!(%date, "timeline pass cancelled");
            report.cancelled = true;
            break;
        }

        let original = store.fetch_or_create_day(date)?;
        let mut day = original.clone();
        state.recalculate(&mut day, settings);
        report.days_visited += 1;

        if day.health_details != original.health_details {
            if synced_fields_differ(&original, &day, settings) {
                report.synced_fields_changed = true;
            }
            store.save_day(&day)?;
            report.days_saved += 1;
        }

        let Some(next) = date.succ_opt() else {
            break;
        };
        date = next;
    }

    tracing::debug!(
        visited = report.days_visited,
        saved = report.days_saved,
        synced_fields_changed = report.synced_fields_changed,
        "timeline pass finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::convert::Infallible;

    use chrono::{TimeZone, Utc};

    use crate::equation::BodyCompositionEquation;
    use crate::measurement::Measurement;
    use crate::types::{BiologicalSex, ExternalId};

    #[derive(Default)]
    struct MemoryDays {
        days: BTreeMap<NaiveDate, Day>,
        settings: Option<Settings>,
        saves: usize,
    }

    impl DayStore for MemoryDays {
        type Error = Infallible;

        fn fetch_day(&self, date: NaiveDate) -> Result<Option<Day>, Infallible> {
            Ok(self.days.get(&date).cloned())
        }

        fn fetch_or_create_day(&mut self, date: NaiveDate) -> Result<Day, Infallible> {
            Ok(self.days.entry(date).or_insert_with(|| Day::new(date)).clone())
        }

        fn save_day(&mut self, day: &Day) -> Result<(), Infallible> {
            self.saves += 1;
            self.days.insert(day.date, day.clone());
            Ok(())
        }

        fn fetch_settings(&self) -> Result<Option<Settings>, Infallible> {
            Ok(self.settings.clone())
        }

        fn save_settings(&mut self, settings: &Settings) -> Result<(), Infallible> {
            self.settings = Some(settings.clone());
            Ok(())
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn ts(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn biological_sex_is_carried_forward() {
        let settings = Settings::new(date(1));
        let mut store = MemoryDays::default();
        let mut first = Day::new(date(1));
        first.health_details.characteristics.biological_sex = Some(BiologicalSex::Female);
        store.save_day(&first).unwrap();

        let report = run_timeline(&mut store, &settings, date(5), || false).unwrap();

        assert_eq!(report.days_visited, 5);
        for day in 1..=5 {
            let stored = store.fetch_day(date(day)).unwrap().unwrap();
            assert_eq!(
                stored.health_details.resolved.biological_sex,
                Some(BiologicalSex::Female)
            );
        }
        let last = store.fetch_day(date(5)).unwrap().unwrap();
        assert!(last.health_details.characteristics.biological_sex.is_none());
    }

    #[test]
    fn second_pass_saves_nothing() {
        let settings = Settings::new(date(1));
        let mut store = MemoryDays::default();
        let mut first = Day::new(date(1));
        first.health_details.weight.add(Measurement::manual(ts(1), 80.0));
        store.save_day(&first).unwrap();

        run_timeline(&mut store, &settings, date(4), || false).unwrap();
        let saves = store.saves;
        let report = run_timeline(&mut store, &settings, date(4), || false).unwrap();

        assert_eq!(report.days_saved, 0);
        assert!(!report.synced_fields_changed);
        assert_eq!(store.saves, saves);
    }

    #[test]
    fn cancellation_stops_between_days() {
        let settings = Settings::new(date(1));
        let mut store = MemoryDays::default();
        let visited = Cell::new(0);

        let report = run_timeline(&mut store, &settings, date(10), || {
            visited.set(visited.get() + 1);
            visited.get() > 3
        })
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.days_visited, 3);
        assert!(store.fetch_day(date(4)).unwrap().is_none());
    }

    #[test]
    fn equation_change_marks_synced_fields() {
        let settings = Settings::new(date(1));
        let mut store = MemoryDays::default();
        let mut day = Day::new(date(1));
        day.health_details.characteristics.biological_sex = Some(BiologicalSex::Male);
        day.health_details.weight.add(Measurement::manual(ts(1), 80.0));
        day.health_details.height.add(Measurement::manual(ts(1), 180.0));
        let mut lbm = Measurement::from_equation(ts(1), 50.0, BodyCompositionEquation::Boer);
        lbm.exported_as = Some(ExternalId::new("hk-1").unwrap());
        day.health_details.lean_body_mass.add(lbm);
        store.save_day(&day).unwrap();

        let report = run_timeline(&mut store, &settings, date(1), || false).unwrap();

        assert!(report.synced_fields_changed);
    }

    #[test]
    fn derived_counterparts_do_not_mark_synced_fields() {
        let settings = Settings::new(date(1));
        let mut store = MemoryDays::default();
        let mut day = Day::new(date(1));
        day.health_details.weight.add(Measurement::manual(ts(1), 80.0));
        day.health_details.lean_body_mass.add(Measurement::manual(ts(1), 60.0));
        store.save_day(&day).unwrap();

        let report = run_timeline(&mut store, &settings, date(1), || false).unwrap();

        assert_eq!(report.days_saved, 1);
        assert!(!report.synced_fields_changed);
        let stored = store.fetch_day(date(1)).unwrap().unwrap();
        assert_eq!(stored.health_details.lean_body_mass.measurements[0].counterpart, Some(25.0));
    }

    #[test]
    fn single_date_uses_stored_history() {
        let settings = Settings::new(date(1));
        let mut store = MemoryDays::default();
        let mut first = Day::new(date(1));
        first.health_details.characteristics.biological_sex = Some(BiologicalSex::Male);
        first.health_details.characteristics.date_of_birth = NaiveDate::from_ymd_opt(1995, 1, 1);
        first.health_details.weight.add(Measurement::manual(ts(1), 80.0));
        first.health_details.height.add(Measurement::manual(ts(1), 180.0));
        store.save_day(&first).unwrap();

        let (day, values, synced_changed) = recalculate_date(&mut store, &settings, date(3)).unwrap();

        assert_eq!(day.health_details.resolved.biological_sex, Some(BiologicalSex::Male));
        assert!(values.resting_energy_kcal.is_some());
        assert!(!synced_changed);
        assert!(store.fetch_day(date(2)).unwrap().is_none());
    }
}
