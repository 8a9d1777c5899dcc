//! Debounced saves and background scheduling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hl_core::{Day, ExternalId, ExternalMeasurement, Measurement, MetricType, Settings, Unit};
use hl_db::Database;
use hl_sync::{Coordinator, ExternalStore, MemoryStore};
use tokio::sync::Mutex;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn today() -> NaiveDate {
    date(5)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap()
}

fn database() -> Arc<Mutex<Database>> {
    database_with(Settings::new(date(1)))
}

fn database_with(settings: Settings) -> Arc<Mutex<Database>> {
    let db = Database::open_in_memory().unwrap();
    db.put_settings(&settings).unwrap();
    Arc::new(Mutex::new(db))
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn weighed(day: u32, kg: f64) -> Day {
    let mut record = Day::new(date(day));
    record
        .health_details
        .weight
        .add(Measurement::manual(Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap(), kg));
    record
}

#[tokio::test]
async fn only_the_last_pending_save_lands() {
    let db = database();
    let coordinator = Coordinator::new(Arc::clone(&db), None, Duration::from_millis(50), now);

    coordinator.save_day(weighed(2, 80.0));
    coordinator.save_day(weighed(2, 81.0));
    coordinator.wait_idle().await;

    let guard = db.lock().await;
    let day2 = guard.day(date(2)).unwrap().unwrap();
    let values: Vec<f64> = day2
        .health_details
        .weight
        .measurements
        .iter()
        .map(|m| m.value)
        .collect();
    assert_eq!(values, vec![81.0]);
    // The follow-up timeline pass reaches today.
    assert!(guard.day(today()).unwrap().is_some());
    assert!(coordinator.last_sync().is_none());
}

#[tokio::test]
async fn synced_edit_triggers_sync() {
    let db = database();
    let store = Arc::new(MemoryStore::new());
    let external: Arc<dyn ExternalStore> = store.clone();
    let coordinator = Coordinator::new(Arc::clone(&db), Some(external), Duration::ZERO, now);

    coordinator.save_day(weighed(3, 79.5));
    coordinator.wait_idle().await;

    assert_eq!(store.measurements(MetricType::Weight).len(), 1);
    let report = coordinator.last_sync().unwrap().unwrap();
    assert_eq!(report.exported, 1);
    assert_eq!(report.failed_fetches, 0);
}

#[tokio::test]
async fn shutdown_drops_pending_saves() {
    let db = database();
    let coordinator = Coordinator::new(Arc::clone(&db), None, Duration::from_secs(10), now);

    coordinator.save_day(weighed(2, 80.0));
    coordinator.shutdown().await;

    assert!(db.lock().await.day(date(2)).unwrap().is_none());
}

#[tokio::test]
async fn one_import_syncs_once() {
    let mut day2 = Day::new(date(2));
    day2.health_details.lean_body_mass.add(Measurement::manual(at(2, 8), 60.0));
    let db = database();
    db.lock().await.put_day(&day2).unwrap();
    let store = Arc::new(MemoryStore::new());
    store.insert(
        MetricType::Weight,
        ExternalMeasurement {
            external_id: ExternalId::new("scale-1").unwrap(),
            timestamp: at(2, 7),
            value: 80.0,
            unit: Unit::Kilogram,
            local_id: None,
        },
    );
    let external: Arc<dyn ExternalStore> = store.clone();
    let coordinator = Coordinator::new(Arc::clone(&db), Some(external), Duration::ZERO, now);

    coordinator.request_sync();
    coordinator.wait_idle().await;

    // Filling in the LBM's derived fat % is not something to send.
    assert_eq!(store.measurement_fetches(MetricType::Weight), 1);
    let report = coordinator.last_sync().unwrap().unwrap();
    assert_eq!(report.imported, 1);
    assert!(!report.timeline.synced_fields_changed);
    let stored = db.lock().await.day(date(2)).unwrap().unwrap();
    assert_eq!(stored.health_details.lean_body_mass.measurements[0].counterpart, Some(25.0));
}

#[tokio::test]
async fn edit_of_unsynced_metric_skips_sync() {
    let mut settings = Settings::new(date(1));
    settings.sync.weight = false;
    let db = database_with(settings);
    let mut day2 = weighed(2, 80.0);
    day2.health_details.lean_body_mass.add(Measurement::manual(at(2, 8), 60.0));
    db.lock().await.put_day(&day2).unwrap();
    let store = Arc::new(MemoryStore::new());
    let external: Arc<dyn ExternalStore> = store.clone();
    let coordinator = Coordinator::new(Arc::clone(&db), Some(external), Duration::ZERO, now);

    day2.health_details.weight.measurements[0].value = 82.0;
    coordinator.save_day(day2);
    coordinator.wait_idle().await;

    assert!(coordinator.last_sync().is_none());
    assert_eq!(store.measurement_fetches(MetricType::LeanBodyMass), 0);
    let stored = db.lock().await.day(date(2)).unwrap().unwrap();
    assert_eq!(stored.health_details.weight.measurements[0].value, 82.0);
    assert!(stored.health_details.lean_body_mass.measurements[0].counterpart.is_some());
}
