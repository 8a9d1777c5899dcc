//! Set command for characteristics and per-day energy details.

use std::io::Write;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use hl_core::{
    ActiveEnergySource, ActivityLevel, BiologicalSex, Day, MaintenanceConfig, PregnancyStatus,
    RestingEnergyEquation, RestingEnergySource, SmokingStatus,
};

use crate::Config;
use crate::commands::edit;

/// What `set` changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Field {
    /// Biological sex: female or male.
    Sex,
    /// Date of birth (YYYY-MM-DD).
    DateOfBirth,
    /// Smoking status: smoker or non_smoker.
    Smoking,
    /// Pregnancy status for the day.
    Pregnancy,
    /// Resting energy source: an equation name, manual or external_sync.
    RestingSource,
    /// Active energy source: an activity level, manual or external_sync.
    ActiveSource,
    /// Days in the adaptive maintenance window (1-28).
    WindowDays,
    /// Days in the weight moving average (2-7).
    MovingAverage,
    /// Whether the estimate stands in when adaptive maintenance is missing.
    EstimateFallback,
    /// Manually entered resting energy for the day (kcal).
    RestingEnergy,
    /// Manually entered active energy for the day (kcal).
    ActiveEnergy,
    /// Weight change over the window, replacing the measured one (kg).
    WeightChange,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    pub field: Field,

    /// New value, or `none` to clear it.
    pub value: String,

    /// Day the change takes effect (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// Parses `value`, where `none` clears.
fn optional<T>(value: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if value == "none" {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .with_context(|| format!("invalid value: {value}"))
}

fn required<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional(value)?.context("this field cannot be cleared")
}

fn kcal(value: &str) -> Result<Option<f64>> {
    let kcal = optional::<f64>(value)?;
    if kcal.is_some_and(|kcal| !kcal.is_finite() || kcal < 0.0) {
        bail!("energy must be a non-negative number, got {value}");
    }
    Ok(kcal)
}

fn switch(value: &str) -> Result<bool> {
    match value {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => bail!("expected on or off, got {value}"),
    }
}

fn resting_source(value: &str) -> Result<RestingEnergySource> {
    Ok(match value {
        "manual" => RestingEnergySource::Manual,
        "external_sync" => RestingEnergySource::ExternalSync,
        _ => RestingEnergySource::Equation {
            equation: required::<RestingEnergyEquation>(value)?,
        },
    })
}

fn active_source(value: &str) -> Result<ActiveEnergySource> {
    Ok(match value {
        "manual" => ActiveEnergySource::Manual,
        "external_sync" => ActiveEnergySource::ExternalSync,
        _ => ActiveEnergySource::ActivityLevel {
            level: required::<ActivityLevel>(value)?,
        },
    })
}

/// The day's explicit maintenance configuration, seeded from the one in
/// effect so an edit changes only the named option.
fn maintenance(day: &mut Day) -> &mut MaintenanceConfig {
    let details = &mut day.health_details;
    let in_effect = details.resolved.maintenance.clone().unwrap_or_default();
    details.characteristics.maintenance.get_or_insert(in_effect)
}

fn apply(day: &mut Day, field: Field, value: &str) -> Result<()> {
    let details = &mut day.health_details;
    match field {
        Field::Sex => details.characteristics.biological_sex = optional::<BiologicalSex>(value)?,
        Field::DateOfBirth => {
            let date_of_birth = optional::<NaiveDate>(value)?;
            if date_of_birth.is_some_and(|dob| dob > day.date) {
                bail!("date of birth cannot be after {}", day.date);
            }
            details.characteristics.date_of_birth = date_of_birth;
        }
        Field::Smoking => details.characteristics.smoking_status = optional::<SmokingStatus>(value)?,
        Field::Pregnancy => details.pregnancy_status = optional::<PregnancyStatus>(value)?,
        Field::RestingEnergy => details.resting_energy_kcal = kcal(value)?,
        Field::ActiveEnergy => details.active_energy_kcal = kcal(value)?,
        Field::WeightChange => {
            let kg = optional::<f64>(value)?;
            if kg.is_some_and(|kg| !kg.is_finite()) {
                bail!("weight change must be a number, got {value}");
            }
            details.weight_change_override_kg = kg;
        }
        Field::RestingSource => maintenance(day).resting_energy = resting_source(value)?,
        Field::ActiveSource => maintenance(day).active_energy = active_source(value)?,
        Field::WindowDays => maintenance(day).window_days = required(value)?,
        Field::MovingAverage => maintenance(day).weight_moving_average_days = optional(value)?,
        Field::EstimateFallback => maintenance(day).use_estimate_as_fallback = switch(value)?,
    }
    if let Some(config) = &day.health_details.characteristics.maintenance {
        config.validate()?;
    }
    Ok(())
}

pub fn run<W: Write>(writer: &mut W, args: &SetArgs, config: &Config) -> Result<()> {
    let edited = edit::apply(config, args.date, |day, _| apply(day, args.field, &args.value))?;

    let name = args
        .field
        .to_possible_value()
        .map_or_else(|| format!("{:?}", args.field), |v| v.get_name().to_string());
    if args.value == "none" {
        writeln!(writer, "Cleared {name} from {}", edited.day.date)?;
    } else {
        writeln!(writer, "Set {name} to {} from {}", args.value, edited.day.date)?;
    }
    if let Some(summary) = edit::sync_summary(edited.sync.as_ref()) {
        writeln!(writer, "{summary}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> Day {
        Day::new(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap())
    }

    #[test]
    fn sets_and_clears_characteristics() {
        let mut day = day();
        apply(&mut day, Field::Sex, "female").unwrap();
        apply(&mut day, Field::DateOfBirth, "1990-05-01").unwrap();
        assert_eq!(
            day.health_details.characteristics.biological_sex,
            Some(BiologicalSex::Female)
        );

        apply(&mut day, Field::Sex, "none").unwrap();
        assert_eq!(day.health_details.characteristics.biological_sex, None);
        assert!(apply(&mut day, Field::Sex, "other").is_err());
        assert!(apply(&mut day, Field::DateOfBirth, "2030-01-01").is_err());
    }

    #[test]
    fn maintenance_edits_start_from_the_config_in_effect() {
        let mut day = day();
        day.health_details.resolved.maintenance = Some(MaintenanceConfig {
            window_days: 14,
            ..MaintenanceConfig::default()
        });

        apply(&mut day, Field::ActiveSource, "very_active").unwrap();

        let config = day.health_details.characteristics.maintenance.unwrap();
        assert_eq!(config.window_days, 14);
        assert_eq!(
            config.active_energy,
            ActiveEnergySource::ActivityLevel {
                level: ActivityLevel::VeryActive
            }
        );
    }

    #[test]
    fn resting_source_accepts_equations() {
        assert_eq!(
            resting_source("katch_mcardle").unwrap(),
            RestingEnergySource::Equation {
                equation: RestingEnergyEquation::KatchMcArdle
            }
        );
        assert_eq!(resting_source("manual").unwrap(), RestingEnergySource::Manual);
        assert!(resting_source("guess").is_err());
    }

    #[test]
    fn invalid_window_is_rejected() {
        let mut day = day();
        let err = apply(&mut day, Field::WindowDays, "29").unwrap_err();
        assert!(err.to_string().contains("between 1 and 28"));
        assert!(apply(&mut day, Field::WindowDays, "none").is_err());
    }

    #[test]
    fn energy_values_must_be_non_negative() {
        let mut day = day();
        apply(&mut day, Field::RestingEnergy, "1650").unwrap();
        assert_eq!(day.health_details.resting_energy_kcal, Some(1650.0));
        assert!(apply(&mut day, Field::ActiveEnergy, "-5").is_err());
        apply(&mut day, Field::WeightChange, "-0.4").unwrap();
        assert_eq!(day.health_details.weight_change_override_kg, Some(-0.4));
    }
}
