//! Log command for recording a body measurement.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveTime};
use clap::Args;
use hl_core::{BodyCompositionEquation, Measurement, MetricType, Unit};

use crate::Config;
use crate::commands::{edit, util};

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Metric to record: weight, height, lean_body_mass or fat_percentage.
    pub metric: MetricType,

    /// Value in `--unit`. Omit when using `--equation`.
    pub value: Option<f64>,

    /// Unit of the value. Defaults to the metric's canonical unit.
    #[arg(long)]
    pub unit: Option<Unit>,

    /// Derive the value from a body composition equation instead.
    #[arg(long, conflicts_with = "value")]
    pub equation: Option<BodyCompositionEquation>,

    /// Day to record on (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Local time of the measurement (HH:MM:SS).
    #[arg(long)]
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Value(f64),
    Equation(BodyCompositionEquation),
}

fn entry(args: &LogArgs) -> Result<Entry> {
    let metric = args.metric;
    match (args.value, args.equation) {
        (Some(value), None) => {
            let unit = args.unit.unwrap_or_else(|| metric.canonical_unit());
            let canonical = unit
                .to_canonical(metric, value)
                .with_context(|| format!("{unit} is not a unit of {metric}"))?;
            let canonical = Measurement::validate_value(metric.as_str(), canonical)?;
            if metric == MetricType::FatPercentage && canonical > 100.0 {
                bail!("fat percentage cannot exceed 100, got {canonical}");
            }
            Ok(Entry::Value(canonical))
        }
        (None, Some(equation)) => {
            if !metric.is_body_composition() {
                bail!("{metric} cannot be derived from a body composition equation");
            }
            Ok(Entry::Equation(equation))
        }
        (Some(_), Some(_)) => bail!("give either a value or --equation, not both"),
        (None, None) => bail!("a value or --equation is required"),
    }
}

pub fn run<W: Write>(writer: &mut W, args: &LogArgs, config: &Config) -> Result<()> {
    let metric = args.metric;
    let entry = entry(args)?;

    let mut logged = None;
    let edited = edit::apply(config, args.date, |day, settings| {
        let timestamp = util::timestamp(day.date, args.time, settings);
        let measurement = match entry {
            Entry::Value(value) => Measurement::manual(timestamp, value),
            // Recalculation fills in the value.
            Entry::Equation(equation) => Measurement::from_equation(timestamp, 0.0, equation),
        };
        logged = Some(measurement.id);
        day.health_details.measurements_mut(metric).add(measurement);
        Ok(())
    })?;

    let date = edited.day.date;
    let Some(measurement) = logged.and_then(|id| {
        edited
            .day
            .health_details
            .measurements(metric)
            .measurements
            .iter()
            .find(|m| m.id == id)
    }) else {
        bail!("{metric} could not be calculated on {date}: equation inputs are missing");
    };

    let unit = metric.canonical_unit();
    let short_id = &measurement.id.to_string()[..8];
    match measurement.equation() {
        Some(equation) => writeln!(
            writer,
            "Logged {metric} {:.1} {unit} ({equation}) on {date} [{short_id}]",
            measurement.value
        )?,
        None => writeln!(
            writer,
            "Logged {metric} {:.1} {unit} on {date} [{short_id}]",
            measurement.value
        )?,
    }
    if let Some(summary) = edit::sync_summary(edited.sync.as_ref()) {
        writeln!(writer, "{summary}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(metric: MetricType, value: Option<f64>) -> LogArgs {
        LogArgs {
            metric,
            value,
            unit: None,
            equation: None,
            date: None,
            time: None,
        }
    }

    #[test]
    fn entry_converts_units() {
        let mut log = args(MetricType::Weight, Some(10.0));
        log.unit = Some(Unit::Stone);
        let Entry::Value(kg) = entry(&log).unwrap() else {
            panic!("expected a value");
        };
        assert!((kg - 63.502_931_8).abs() < 1e-6);
    }

    #[test]
    fn entry_rejects_mismatched_unit() {
        let mut log = args(MetricType::Height, Some(180.0));
        log.unit = Some(Unit::Kilogram);
        let err = entry(&log).unwrap_err();
        assert_eq!(err.to_string(), "kg is not a unit of height");
    }

    #[test]
    fn entry_rejects_equation_for_weight() {
        let mut log = args(MetricType::Weight, None);
        log.equation = Some(BodyCompositionEquation::Boer);
        assert!(entry(&log).is_err());
    }

    #[test]
    fn entry_needs_value_or_equation() {
        let err = entry(&args(MetricType::Weight, None)).unwrap_err();
        assert_eq!(err.to_string(), "a value or --equation is required");
        assert!(entry(&args(MetricType::FatPercentage, Some(120.0))).is_err());
        assert!(entry(&args(MetricType::Weight, Some(-1.0))).is_err());
    }
}
