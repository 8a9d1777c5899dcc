//! The save path shared by commands that edit a day.

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use hl_core::{Day, Settings};
use hl_sync::{Coordinator, SyncReport};
use tokio::sync::Mutex;

use crate::Config;
use crate::commands::util;

/// A day after an edit has been saved and recalculated.
#[derive(Debug)]
pub struct Edited {
    pub day: Day,
    pub settings: Settings,
    /// Outcome of the sync the edit triggered, if any.
    pub sync: Option<Result<SyncReport, String>>,
}

/// Applies `edit` to the day at `date` and hands it to a [`Coordinator`],
/// which saves it after the configured debounce, recalculates it and then
/// syncs or recalculates the timeline. Returns once all of that is done.
pub fn apply<F>(config: &Config, date: Option<NaiveDate>, edit: F) -> Result<Edited>
where
    F: FnOnce(&mut Day, &Settings) -> Result<()>,
{
    let db = util::open_database(config)?;
    let settings = util::load_settings(&db)?;
    let date = util::resolve_date(date, &settings)?;
    let mut day = db.day(date)?.unwrap_or_else(|| Day::new(date));
    edit(&mut day, &settings)?;

    let store = config.external_store()?;
    let runtime = util::runtime()?;
    runtime.block_on(async move {
        let coordinator = Coordinator::new(
            Arc::new(Mutex::new(db)),
            store,
            config.debounce(),
            Utc::now,
        );
        coordinator.save_day(day);
        coordinator.wait_idle().await;

        let saved = coordinator.db().lock().await.day(date)?;
        tracing::debug!(%date, saved = saved.is_some(), "edit finished");
        Ok::<_, anyhow::Error>(Edited {
            day: saved.unwrap_or_else(|| Day::new(date)),
            settings,
            sync: coordinator.last_sync(),
        })
    })
}

/// A one-line summary of a sync an edit triggered.
pub fn sync_summary(sync: Option<&Result<SyncReport, String>>) -> Option<String> {
    match sync? {
        Ok(report) => Some(format!(
            "Synced: {} imported, {} exported, {} deleted externally",
            report.imported, report.exported, report.deleted_externally
        )),
        Err(err) => Some(format!("Sync failed: {err}")),
    }
}
