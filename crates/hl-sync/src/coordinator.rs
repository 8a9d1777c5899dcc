//! Scheduling of saves, recalculation and sync.
//!
//! Each logical unit of work owns one task handle and one child
//! cancellation token. A new request for the same unit cancels the old one:
//! day saves are debounced per day, and the timeline pass and sync are
//! single-flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use hl_core::{Day, DayStore, Settings, TimelineReport, recalculate_date, run_timeline};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::orchestrator::{SyncError, SyncOrchestrator, SyncReport, edit_needs_sync};
use crate::store::ExternalStore;

/// Upper bound on back-to-back syncs triggered by recalculation changing
/// synced fields.
const MAX_SYNC_ROUNDS: usize = 3;

#[derive(Debug)]
struct Unit {
    handle: JoinHandle<()>,
    cancel: CancelToken,
}

impl Unit {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the background work for one local store.
pub struct Coordinator<S> {
    db: Arc<Mutex<S>>,
    store: Option<Arc<dyn ExternalStore>>,
    root: CancelToken,
    debounce: Duration,
    now: fn() -> DateTime<Utc>,
    saves: StdMutex<HashMap<NaiveDate, Unit>>,
    recalc: StdMutex<Option<Unit>>,
    sync: StdMutex<Option<Unit>>,
    last_sync: StdMutex<Option<Result<SyncReport, String>>>,
}

impl<S> Coordinator<S>
where
    S: DayStore + Send + 'static,
{
    /// Creates a coordinator. Without an external store, edits only trigger
    /// recalculation. `now` is the clock; today is its local date under the
    /// saved settings.
    pub fn new(
        db: Arc<Mutex<S>>,
        store: Option<Arc<dyn ExternalStore>>,
        debounce: Duration,
        now: fn() -> DateTime<Utc>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            store,
            root: CancelToken::new(),
            debounce,
            now,
            saves: StdMutex::new(HashMap::new()),
            recalc: StdMutex::new(None),
            sync: StdMutex::new(None),
            last_sync: StdMutex::new(None),
        })
    }

    pub fn db(&self) -> &Arc<Mutex<S>> {
        &self.db
    }

    /// Outcome of the most recent finished sync.
    pub fn last_sync(&self) -> Option<Result<SyncReport, String>> {
        lock(&self.last_sync).clone()
    }

    /// Schedules `day` to be saved after the debounce interval, replacing
    /// any save still pending for the same date.
    ///
    /// After saving, the day is recalculated. If the edit touched a synced
    /// field a sync follows; otherwise a timeline pass updates later days.
    pub fn save_day(self: &Arc<Self>, day: Day) {
        let date = day.date;
        let cancel = self.root.child();
        let token = cancel.clone();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!(%date, "pending save superseded");
                    return;
                }
                () = tokio::time::sleep(this.debounce) => {}
            }
            match this.persist(day, &token).await {
                Ok(true) if this.store.is_some() => this.request_sync(),
                Ok(_) => this.request_recalc(),
                Err(SyncError::Cancelled) => {}
                Err(err) => tracing::warn!(%date, error = %err, "saving day failed"),
            }
        });
        if let Some(previous) = lock(&self.saves).insert(date, Unit { handle, cancel }) {
            previous.stop();
        }
    }

    /// Saves and recalculates one day. Returns whether a sync is needed.
    async fn persist(&self, day: Day, token: &CancelToken) -> Result<bool, SyncError> {
        let mut db = Arc::clone(&self.db).lock_owned().await;
        if token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        tokio::task::spawn_blocking(move || -> Result<bool, SyncError> {
            let settings = db
                .fetch_settings()
                .map_err(SyncError::local)?
                .ok_or(SyncError::NotInitialized)?;
            let before = db.fetch_day(day.date).map_err(SyncError::local)?;
            let edited = edit_needs_sync(before.as_ref(), &day, &settings);
            db.save_day(&day).map_err(SyncError::local)?;
            let (_, _, recalculated) =
                recalculate_date(&mut *db, &settings, day.date).map_err(SyncError::local)?;
            tracing::debug!(date = %day.date, edited, recalculated, "day saved");
            Ok(edited || recalculated)
        })
        .await?
    }

    /// Starts a timeline pass, cancelling one already running.
    pub fn request_recalc(self: &Arc<Self>) {
        let cancel = self.root.child();
        let token = cancel.clone();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            match this.run_recalc(&token).await {
                Ok(report) if report.cancelled => tracing::debug!("timeline pass superseded"),
                Ok(_) | Err(SyncError::Cancelled) => {}
                Err(err) => tracing::warn!(error = %err, "timeline pass failed"),
            }
        });
        if let Some(previous) = lock(&self.recalc).replace(Unit { handle, cancel }) {
            previous.stop();
        }
    }

    async fn settings(&self) -> Result<Settings, SyncError> {
        self.db
            .lock()
            .await
            .fetch_settings()
            .map_err(SyncError::local)?
            .ok_or(SyncError::NotInitialized)
    }

    async fn run_recalc(&self, token: &CancelToken) -> Result<TimelineReport, SyncError> {
        let mut db = Arc::clone(&self.db).lock_owned().await;
        let now = (self.now)();
        let token = token.clone();
        tokio::task::spawn_blocking(move || -> Result<TimelineReport, SyncError> {
            let settings = db
                .fetch_settings()
                .map_err(SyncError::local)?
                .ok_or(SyncError::NotInitialized)?;
            let today = settings.local_date(now);
            run_timeline(&mut *db, &settings, today, || token.is_cancelled())
                .map_err(SyncError::local)
        })
        .await?
    }

    /// Starts a sync, cancelling one already running. The sync ends with
    /// its own timeline pass, so a pending standalone pass is cancelled too.
    pub fn request_sync(self: &Arc<Self>) {
        let Some(store) = self.store.clone() else {
            self.request_recalc();
            return;
        };
        if let Some(previous) = lock(&self.recalc).take() {
            previous.stop();
        }
        let cancel = self.root.child();
        let token = cancel.clone();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = this.run_sync(store, &token).await;
            match &result {
                Err(SyncError::Cancelled) => {
                    tracing::debug!("sync superseded");
                    return;
                }
                Err(err) => tracing::warn!(error = %err, "sync failed"),
                Ok(_) => {}
            }
            *lock(&this.last_sync) = Some(result.map_err(|err| err.to_string()));
        });
        if let Some(previous) = lock(&self.sync).replace(Unit { handle, cancel }) {
            previous.stop();
        }
    }

    async fn run_sync(
        &self,
        store: Arc<dyn ExternalStore>,
        token: &CancelToken,
    ) -> Result<SyncReport, SyncError> {
        let orchestrator = SyncOrchestrator::new(store);
        let today = self.settings().await?.local_date((self.now)());
        let mut round = 1;
        loop {
            let report = orchestrator.sync(&self.db, today, token).await?;
            // A pass that left synced fields alone has nothing new to send.
            if !report.timeline.synced_fields_changed || round == MAX_SYNC_ROUNDS {
                return Ok(report);
            }
            tracing::debug!(round, "recalculation changed synced fields, syncing again");
            round += 1;
        }
    }

    fn take_handles(&self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<_> = lock(&self.saves)
            .drain()
            .map(|(_, unit)| unit.handle)
            .collect();
        handles.extend(lock(&self.recalc).take().map(|unit| unit.handle));
        handles.extend(lock(&self.sync).take().map(|unit| unit.handle));
        handles
    }

    /// Waits until every scheduled unit, including the ones they schedule
    /// in turn, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let handles = self.take_handles();
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(err) = handle.await {
                    if !err.is_cancelled() {
                        tracing::warn!(error = %err, "background task failed");
                    }
                }
            }
        }
    }

    /// Cancels all outstanding work and waits for it to stop.
    pub async fn shutdown(&self) {
        self.root.cancel();
        self.wait_idle().await;
    }
}
