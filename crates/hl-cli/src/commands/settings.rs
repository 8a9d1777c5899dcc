//! Settings command for viewing and changing log-wide settings.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Args;
use hl_core::{AggregationPolicy, MetricType, Settings, SyncSettings, run_timeline};

use crate::Config;
use crate::commands::util;

#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Offset of local time from UTC, in minutes.
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset_minutes: Option<i32>,

    /// Aggregation policy for a metric (e.g. weight=average).
    #[arg(long = "aggregate", value_name = "METRIC=POLICY")]
    pub aggregate: Vec<String>,

    /// Turn syncing of a field on or off (e.g. height=off).
    #[arg(long = "sync", value_name = "FIELD=on|off")]
    pub sync: Vec<String>,

    /// Output JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

const SYNC_FIELDS: &[&str] = &[
    "weight",
    "height",
    "lean_body_mass",
    "fat_percentage",
    "resting_energy",
    "active_energy",
    "dietary_energy",
    "characteristics",
];

fn split(assignment: &str) -> Result<(&str, &str)> {
    assignment
        .split_once('=')
        .with_context(|| format!("expected NAME=VALUE, got {assignment}"))
}

fn sync_flag<'a>(sync: &'a mut SyncSettings, field: &str) -> Result<&'a mut bool> {
    Ok(match field {
        "weight" => &mut sync.weight,
        "height" => &mut sync.height,
        "lean_body_mass" => &mut sync.lean_body_mass,
        "fat_percentage" => &mut sync.fat_percentage,
        "resting_energy" => &mut sync.resting_energy,
        "active_energy" => &mut sync.active_energy,
        "dietary_energy" => &mut sync.dietary_energy,
        "characteristics" => &mut sync.characteristics,
        _ => bail!("unknown sync field {field}; expected one of {}", SYNC_FIELDS.join(", ")),
    })
}

/// Applies the requested changes. Returns whether anything changed.
fn apply(settings: &mut Settings, args: &SettingsArgs) -> Result<bool> {
    let before = settings.clone();
    if let Some(offset) = args.utc_offset_minutes {
        settings.utc_offset_minutes = offset;
    }
    for assignment in &args.aggregate {
        let (metric, policy) = split(assignment)?;
        let metric: MetricType = metric.parse()?;
        let policy: AggregationPolicy = policy.parse()?;
        settings.aggregation.set_policy(metric, policy);
    }
    for assignment in &args.sync {
        let (field, value) = split(assignment)?;
        *sync_flag(&mut settings.sync, field)? = match value {
            "on" => true,
            "off" => false,
            _ => bail!("expected on or off for {field}, got {value}"),
        };
    }
    Ok(*settings != before)
}

fn render<W: Write>(writer: &mut W, settings: &Settings) -> Result<()> {
    writeln!(writer, "Log start:      {}", settings.log_start_date)?;
    writeln!(writer, "UTC offset:     {} min", settings.utc_offset_minutes)?;
    writeln!(writer, "Aggregation:")?;
    for metric in MetricType::ALL.iter().copied() {
        writeln!(
            writer,
            "  {:<16}{}",
            metric.as_str(),
            settings.aggregation.policy(metric)
        )?;
    }
    writeln!(writer, "Sync:")?;
    let mut sync = settings.sync;
    for field in SYNC_FIELDS {
        let enabled = *sync_flag(&mut sync, field)?;
        writeln!(writer, "  {field:<16}{}", if enabled { "on" } else { "off" })?;
    }
    Ok(())
}

pub fn run<W: Write>(writer: &mut W, args: &SettingsArgs, config: &Config) -> Result<()> {
    let mut db = util::open_database(config)?;
    let mut settings = util::load_settings(&db)?;

    if apply(&mut settings, args)? {
        db.put_settings(&settings)?;
        // Aggregation and day boundaries feed every derived value.
        let report = run_timeline(&mut db, &settings, util::today(&settings), || false)?;
        tracing::debug!(saved = report.days_saved, "settings changed, timeline recalculated");
    }

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&settings)?)?;
        return Ok(());
    }
    render(writer, &settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;
    use insta::assert_snapshot;

    fn args() -> SettingsArgs {
        SettingsArgs {
            utc_offset_minutes: None,
            aggregate: Vec::new(),
            sync: Vec::new(),
            json: false,
        }
    }

    fn settings() -> Settings {
        Settings::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
    }

    #[test]
    fn apply_changes_policies_and_sync_flags() {
        let mut settings = settings();
        let args = SettingsArgs {
            utc_offset_minutes: Some(-300),
            aggregate: vec!["weight=average".to_string()],
            sync: vec!["height=off".to_string()],
            ..args()
        };

        assert!(apply(&mut settings, &args).unwrap());

        assert_eq!(settings.utc_offset_minutes, -300);
        assert_eq!(settings.aggregation.policy(MetricType::Weight), AggregationPolicy::Average);
        assert!(!settings.sync.height);
        assert!(!apply(&mut settings, &args).unwrap());
    }

    #[test]
    fn apply_rejects_unknown_names() {
        let mut settings = settings();
        let bad_field = SettingsArgs {
            sync: vec!["mood=on".to_string()],
            ..args()
        };
        assert!(apply(&mut settings, &bad_field).is_err());

        let bad_policy = SettingsArgs {
            aggregate: vec!["weight=median".to_string()],
            ..args()
        };
        assert!(apply(&mut settings, &bad_policy).is_err());
        assert!(apply(&mut settings, &SettingsArgs { sync: vec!["weight".to_string()], ..args() }).is_err());
    }

    #[test]
    fn render_lists_settings() {
        let mut settings = settings();
        settings.sync.characteristics = false;
        let mut output = Vec::new();
        render(&mut output, &settings).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Log start:      2025-03-01
        UTC offset:     0 min
        Aggregation:
          weight          last
          height          last
          lean_body_mass  last
          fat_percentage  last
        Sync:
          weight          on
          height          on
          lean_body_mass  on
          fat_percentage  on
          resting_energy  on
          active_energy   on
          dietary_energy  on
          characteristics off
        ");
    }
}
