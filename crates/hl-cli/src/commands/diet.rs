//! Diet command for recording a day's dietary energy.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;
use hl_core::{DietaryEnergyPoint, DietaryEnergySource};

use crate::Config;
use crate::commands::edit;

#[derive(Debug, Args)]
pub struct DietArgs {
    /// Energy eaten in kcal, `fasted`, `exclude` (count the day as the
    /// window average) or `none` to clear.
    pub value: String,

    /// Day to record on (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

fn point(date: NaiveDate, value: &str) -> Result<Option<DietaryEnergyPoint>> {
    let point = match value {
        "none" => return Ok(None),
        "fasted" => DietaryEnergyPoint::new(date, Some(0.0), DietaryEnergySource::FastedZero),
        "exclude" => DietaryEnergyPoint::new(date, None, DietaryEnergySource::ExcludedUseAverage),
        _ => {
            let kcal: f64 = value
                .parse()
                .with_context(|| format!("invalid dietary energy: {value}"))?;
            if !kcal.is_finite() || kcal < 0.0 {
                bail!("dietary energy must be a non-negative number, got {value}");
            }
            DietaryEnergyPoint::new(date, Some(kcal), DietaryEnergySource::ManualEntry)
        }
    };
    Ok(Some(point))
}

pub fn run<W: Write>(writer: &mut W, args: &DietArgs, config: &Config) -> Result<()> {
    let edited = edit::apply(config, args.date, |day, _| {
        day.dietary_energy_point = point(day.date, &args.value)?;
        Ok(())
    })?;

    let date = edited.day.date;
    match &edited.day.dietary_energy_point {
        None => writeln!(writer, "Cleared dietary energy on {date}")?,
        Some(point) => match point.source {
            DietaryEnergySource::ExcludedUseAverage => {
                writeln!(writer, "Excluded {date} from dietary energy averages")?;
            }
            _ => writeln!(
                writer,
                "Recorded {:.0} kcal on {date}",
                point.kcal.unwrap_or_default()
            )?,
        },
    }
    if let Some(summary) = edit::sync_summary(edited.sync.as_ref()) {
        writeln!(writer, "{summary}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    #[test]
    fn parses_special_values() {
        let fasted = point(date(), "fasted").unwrap().unwrap();
        assert_eq!(fasted.source, DietaryEnergySource::FastedZero);
        assert_eq!(fasted.counted_kcal(), Some(0.0));

        let excluded = point(date(), "exclude").unwrap().unwrap();
        assert_eq!(excluded.counted_kcal(), None);

        assert_eq!(point(date(), "none").unwrap(), None);
    }

    #[test]
    fn parses_kcal() {
        let eaten = point(date(), "2150").unwrap().unwrap();
        assert_eq!(eaten.kcal, Some(2150.0));
        assert_eq!(eaten.source, DietaryEnergySource::ManualEntry);
        assert!(point(date(), "-1").is_err());
        assert!(point(date(), "lots").is_err());
    }
}
