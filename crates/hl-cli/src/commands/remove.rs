//! Remove command for deleting a measurement.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::Args;
use hl_core::MetricType;

use crate::Config;
use crate::commands::edit;

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Metric of the measurement.
    pub metric: MetricType,

    /// ID of the measurement, or a unique prefix of it.
    pub id: String,

    /// Day the measurement is on (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// Deletes the measurement. One that also exists in the external store is
/// kept as a tombstone so the next sync deletes it there and never imports
/// it again.
pub fn run<W: Write>(writer: &mut W, args: &RemoveArgs, config: &Config) -> Result<()> {
    let metric = args.metric;
    let mut removed = None;
    let edited = edit::apply(config, args.date, |day, _| {
        let set = day.health_details.measurements_mut(metric);
        let Some(id) = set.find_by_prefix(&args.id).map(|m| m.id) else {
            bail!(
                "no single {metric} measurement on {} matches {}",
                day.date,
                args.id
            );
        };
        removed = set.remove(id);
        Ok(())
    })?;

    if let Some(measurement) = removed {
        write!(
            writer,
            "Removed {metric} {:.1} {} from {}",
            measurement.value,
            metric.canonical_unit(),
            edited.day.date
        )?;
        if measurement.external_id().is_some() {
            write!(writer, " (also deleted from the external store on sync)")?;
        }
        writeln!(writer)?;
    }
    if let Some(summary) = edit::sync_summary(edited.sync.as_ref()) {
        writeln!(writer, "{summary}")?;
    }
    Ok(())
}
