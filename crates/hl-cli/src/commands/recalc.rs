//! Recalc command for a full timeline pass.

use std::io::Write;

use anyhow::Result;
use hl_core::run_timeline;

use crate::Config;
use crate::commands::util;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let mut db = util::open_database(config)?;
    let settings = util::load_settings(&db)?;
    let today = util::today(&settings);

    let report = run_timeline(&mut db, &settings, today, || false)?;

    writeln!(
        writer,
        "Recalculated {} days from {} to {today}, {} changed",
        report.days_visited, settings.log_start_date, report.days_saved
    )?;
    if report.synced_fields_changed {
        writeln!(writer, "Synced fields changed; run `hl sync` to update the external store")?;
    }
    Ok(())
}
