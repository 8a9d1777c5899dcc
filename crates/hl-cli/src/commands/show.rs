//! Show command for a day's records and computed values.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use hl_core::health::MaintenanceSource;
use hl_core::{
    DailyValues, Day, DietaryEnergySource, MeasurementSource, MetricType, Settings, TimelineState,
};
use serde_json::json;

use crate::Config;
use crate::commands::util;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Day to show (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Output JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Recalculates the day in memory from the stored days before it and
/// prints it. Nothing is saved.
pub fn run<W: Write>(writer: &mut W, args: &ShowArgs, config: &Config) -> Result<()> {
    let db = util::open_database(config)?;
    let settings = util::load_settings(&db)?;
    let date = util::resolve_date(args.date, &settings)?;

    let mut state = TimelineState::before(&db, &settings, date)?;
    let mut day = db.day(date)?.unwrap_or_else(|| Day::new(date));
    let values = state.recalculate(&mut day, &settings);

    if args.json {
        let output = json!({ "day": day, "values": values });
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
    } else {
        render(writer, &day, &values, &settings)?;
    }
    Ok(())
}

const fn metric_label(metric: MetricType) -> &'static str {
    match metric {
        MetricType::Weight => "Weight",
        MetricType::Height => "Height",
        MetricType::LeanBodyMass => "Lean body mass",
        MetricType::FatPercentage => "Fat percentage",
    }
}

const fn dietary_label(source: DietaryEnergySource) -> &'static str {
    match source {
        DietaryEnergySource::Log => "log",
        DietaryEnergySource::ExternalSync => "external",
        DietaryEnergySource::FastedZero => "fasted",
        DietaryEnergySource::ManualEntry => "manual",
        DietaryEnergySource::ExcludedUseAverage => "excluded",
    }
}

fn quantity(value: Option<f64>, decimals: usize, unit: &str) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.decimals$} {unit}"))
}

fn line<W: Write>(writer: &mut W, label: &str, value: &str) -> std::io::Result<()> {
    writeln!(writer, "{label:<16}{value}")
}

fn render<W: Write>(
    writer: &mut W,
    day: &Day,
    values: &DailyValues,
    settings: &Settings,
) -> Result<()> {
    let details = &day.health_details;
    writeln!(writer, "{}", day.date)?;
    line(
        writer,
        "Sex",
        details
            .resolved
            .biological_sex
            .map_or("-", |sex| sex.as_str()),
    )?;
    let age = values
        .age_years
        .map_or_else(|| "-".to_string(), |age| age.to_string());
    line(writer, "Age", &age)?;

    for metric in MetricType::ALL.iter().copied() {
        let daily = match metric {
            MetricType::Weight => values.weight_kg,
            MetricType::Height => values.height_cm,
            MetricType::LeanBodyMass => values.lean_body_mass_kg,
            MetricType::FatPercentage => values.fat_percentage,
        };
        let unit = metric.canonical_unit();
        line(writer, metric_label(metric), &quantity(daily, 1, unit.as_str()))?;
        for measurement in &details.measurements(metric).measurements {
            let source = match &measurement.source {
                MeasurementSource::Manual => "manual".to_string(),
                MeasurementSource::Equation { equation } => equation.to_string(),
                MeasurementSource::ExternalSync { .. } => "external".to_string(),
            };
            writeln!(
                writer,
                "  {} {} {:>7.1} {source}",
                &measurement.id.to_string()[..8],
                util::local_time(measurement.date_time, settings),
                measurement.value,
            )?;
        }
    }

    line(writer, "Resting energy", &quantity(values.resting_energy_kcal, 0, "kcal"))?;
    line(writer, "Active energy", &quantity(values.active_energy_kcal, 0, "kcal"))?;
    let dietary = day.dietary_energy_point.as_ref().map_or_else(
        || "-".to_string(),
        |point| match point.counted_kcal() {
            Some(kcal) => format!("{kcal:.0} kcal ({})", dietary_label(point.source)),
            None => dietary_label(point.source).to_string(),
        },
    );
    line(writer, "Dietary energy", &dietary)?;

    let Some(maintenance) = &details.maintenance else {
        line(writer, "Maintenance", "-")?;
        return Ok(());
    };
    let source = match maintenance.source {
        Some(MaintenanceSource::Adaptive) => " (adaptive)",
        Some(MaintenanceSource::Estimate) => " (estimate)",
        None => "",
    };
    line(
        writer,
        "Maintenance",
        &format!("{}{source}", quantity(maintenance.kcal, 0, "kcal")),
    )?;
    line(writer, "  Estimate", &quantity(maintenance.estimate_kcal, 0, "kcal"))?;
    line(
        writer,
        "  Diet average",
        &quantity(maintenance.adaptive.dietary_energy.kcal_per_day, 0, "kcal/day"),
    )?;
    line(
        writer,
        "  Weight change",
        &maintenance
            .adaptive
            .weight_change
            .kg()
            .map_or_else(|| "-".to_string(), |kg| format!("{kg:+.2} kg")),
    )?;
    Ok(())
}
