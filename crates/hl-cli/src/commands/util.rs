//! Shared utilities for CLI commands.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use hl_core::Settings;
use hl_db::Database;

use crate::Config;

/// Time of day given to measurements logged for a past day without `--time`.
fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

/// Opens the configured database, creating its directory if needed.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

pub fn load_settings(db: &Database) -> Result<Settings> {
    db.settings()?
        .context("log is not initialized; run `hl init` first")
}

/// Today's date in the log's local time.
pub fn today(settings: &Settings) -> NaiveDate {
    settings.local_date(Utc::now())
}

/// Resolves `--date`, defaulting to today. The date must fall within the log.
pub fn resolve_date(date: Option<NaiveDate>, settings: &Settings) -> Result<NaiveDate> {
    let today = today(settings);
    let date = date.unwrap_or(today);
    if date < settings.log_start_date {
        bail!(
            "{date} is before the log start ({})",
            settings.log_start_date
        );
    }
    if date > today {
        bail!("{date} is in the future");
    }
    Ok(date)
}

/// The instant of local `time` on `date`. Without a time, today's entries
/// are stamped now and past entries at noon.
pub fn timestamp(date: NaiveDate, time: Option<NaiveTime>, settings: &Settings) -> DateTime<Utc> {
    let offset = Duration::minutes(i64::from(settings.utc_offset_minutes));
    let now = Utc::now();
    let time = time.unwrap_or_else(|| {
        if date == settings.local_date(now) {
            (now + offset).time()
        } else {
            default_time()
        }
    });
    Utc.from_utc_datetime(&(date.and_time(time) - offset))
}

/// Local wall-clock time of `timestamp`, for display.
pub fn local_time(timestamp: DateTime<Utc>, settings: &Settings) -> String {
    let offset = Duration::minutes(i64::from(settings.utc_offset_minutes));
    (timestamp + offset).format("%H:%M").to_string()
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")
}

/// Formats an optional number with `decimals` places, or `-`.
pub fn number(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.decimals$}"))
}
