//! Init command for starting the log.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::Args;
use hl_core::{Settings, run_timeline};

use crate::Config;
use crate::commands::util;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// First day of the log (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Offset of local time from UTC, in minutes.
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset_minutes: Option<i32>,
}

/// Creates the settings, or moves the start date of an existing log, then
/// recalculates every day of the log.
pub fn run<W: Write>(writer: &mut W, args: &InitArgs, config: &Config) -> Result<()> {
    let mut db = util::open_database(config)?;
    let existing = db.settings()?;
    let initialized = existing.is_some();

    let mut settings = existing.unwrap_or_else(|| Settings::new(NaiveDate::MIN));
    if let Some(offset) = args.utc_offset_minutes {
        settings.utc_offset_minutes = offset;
    }
    let today = util::today(&settings);
    if let Some(start) = args.start {
        settings.log_start_date = start;
    } else if !initialized {
        settings.log_start_date = today;
    }
    if settings.log_start_date > today {
        bail!("start date {} is in the future", settings.log_start_date);
    }

    db.put_settings(&settings)?;
    let report = run_timeline(&mut db, &settings, today, || false)?;
    tracing::debug!(start = %settings.log_start_date, initialized, "log initialized");

    writeln!(writer, "Log starts on {}", settings.log_start_date)?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Recalculated {} days", report.days_visited)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use insta::assert_snapshot;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> Config {
        Config {
            database_path: temp.path().join("hl.db"),
            ..Config::default()
        }
    }

    #[test]
    fn init_creates_settings_and_days() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let start = chrono::Utc::now().date_naive() - Duration::days(2);

        let mut output = Vec::new();
        run(
            &mut output,
            &InitArgs {
                start: Some(start),
                utc_offset_minutes: None,
            },
            &config,
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output
            .replace(&temp.path().display().to_string(), "[TEMP]")
            .replace(&start.to_string(), "[START]");
        assert_snapshot!(output, @r"
        Log starts on [START]
        Database: [TEMP]/hl.db
        Recalculated 3 days
        ");

        let db = util::open_database(&config).unwrap();
        assert_eq!(db.settings().unwrap().unwrap().log_start_date, start);
        assert_eq!(db.list_days(start, start + Duration::days(30)).unwrap().len(), 3);
    }

    #[test]
    fn init_rejects_future_start() {
        let temp = TempDir::new().unwrap();
        let start = chrono::Utc::now().date_naive() + Duration::days(3);

        let err = run(
            &mut Vec::new(),
            &InitArgs {
                start: Some(start),
                utc_offset_minutes: None,
            },
            &config(&temp),
        )
        .unwrap_err();

        assert!(err.to_string().contains("in the future"));
    }

    #[test]
    fn init_keeps_existing_settings() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let start = chrono::Utc::now().date_naive() - Duration::days(1);
        let args = InitArgs {
            start: Some(start),
            utc_offset_minutes: Some(60),
        };
        run(&mut Vec::new(), &args, &config).unwrap();

        run(
            &mut Vec::new(),
            &InitArgs {
                start: None,
                utc_offset_minutes: None,
            },
            &config,
        )
        .unwrap();

        let db = util::open_database(&config).unwrap();
        let settings = db.settings().unwrap().unwrap();
        assert_eq!(settings.log_start_date, start);
        assert_eq!(settings.utc_offset_minutes, 60);
    }
}
