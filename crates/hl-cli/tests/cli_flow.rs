//! End-to-end tests driving the `hl` binary against a temporary database.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;
use tempfile::TempDir;

fn hl_binary() -> String {
    env!("CARGO_BIN_EXE_hl").to_string()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days_ago(days: i64) -> String {
    (today() - Duration::days(days)).to_string()
}

/// A health log in a temporary directory, with saves undelayed.
struct TestLog {
    temp: TempDir,
    config: PathBuf,
}

impl TestLog {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("hl.db");
        let config = temp.path().join("config.toml");
        let mut file = std::fs::File::create(&config).unwrap();
        writeln!(file, r#"database_path = "{}""#, db_path.display()).unwrap();
        Self { temp, config }
    }

    fn initialized(days_back: i64) -> Self {
        let log = Self::new();
        log.ok(&["init", "--start", &days_ago(days_back)]);
        log
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(hl_binary())
            .env("HOME", self.temp.path())
            .env("XDG_CONFIG_HOME", self.temp.path().join(".config"))
            .env("HL_DEBOUNCE_MS", "0")
            .env_remove("HL_EXTERNAL_URL")
            .env_remove("HL_EXTERNAL_TOKEN")
            .env_remove("HL_DATABASE_PATH")
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("failed to run hl")
    }

    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "hl {args:?} should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn show(&self, date: &str) -> Value {
        serde_json::from_str(&self.ok(&["show", "--json", "--date", date])).unwrap()
    }
}

#[test]
fn commands_require_init() {
    let log = TestLog::new();

    let output = log.run(&["log", "weight", "80"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("hl init"), "unexpected error: {stderr}");
}

#[test]
fn logged_weight_is_shown() {
    let log = TestLog::initialized(3);
    let date = days_ago(1);

    let stdout = log.ok(&["log", "weight", "80", "--date", &date]);
    assert!(stdout.starts_with(&format!("Logged weight 80.0 kg on {date}")));

    let shown = log.show(&date);
    assert_eq!(shown["values"]["weight_kg"].as_f64(), Some(80.0));
    let measurements = shown["day"]["health_details"]["weight"]["measurements"]
        .as_array()
        .unwrap();
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0]["source"]["kind"], "manual");
}

#[test]
fn units_are_converted_on_entry() {
    let log = TestLog::initialized(1);

    log.ok(&["log", "weight", "10", "--unit", "st"]);

    let shown = log.show(&days_ago(0));
    let kg = shown["values"]["weight_kg"].as_f64().unwrap();
    assert!((kg - 63.502_931_8).abs() < 1e-6);
    let output = log.run(&["log", "height", "80", "--unit", "kg"]);
    assert!(!output.status.success());
}

#[test]
fn characteristics_carry_forward_into_equations() {
    let log = TestLog::initialized(2);
    let start = days_ago(2);

    log.ok(&["set", "sex", "male", "--date", &start]);
    log.ok(&["set", "date-of-birth", "1990-01-01", "--date", &start]);
    log.ok(&["log", "height", "180", "--date", &start]);
    log.ok(&["log", "weight", "80", "--date", &start]);

    let shown = log.show(&days_ago(0));
    assert_eq!(
        shown["day"]["health_details"]["resolved"]["biological_sex"],
        "male"
    );
    let resting = shown["values"]["resting_energy_kcal"].as_f64().unwrap();
    assert!(resting > 1500.0 && resting < 1900.0, "resting energy {resting}");
    assert!(shown["values"]["maintenance_kcal"].as_f64().unwrap() > resting);
}

#[test]
fn equation_measurement_is_derived() {
    let log = TestLog::initialized(1);
    log.ok(&["set", "sex", "male"]);
    log.ok(&["log", "height", "180"]);
    log.ok(&["log", "weight", "80"]);

    let stdout = log.ok(&["log", "lean_body_mass", "--equation", "boer"]);

    assert!(stdout.contains("61.4 kg (boer)"), "unexpected output: {stdout}");
    let shown = log.show(&days_ago(0));
    let fat = shown["values"]["fat_percentage"].as_f64().unwrap();
    assert!((fat - (1.0 - 61.42 / 80.0) * 100.0).abs() < 1e-6);
}

#[test]
fn equation_without_inputs_is_rejected() {
    let log = TestLog::initialized(1);

    let output = log.run(&["log", "lean_body_mass", "--equation", "boer"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("equation inputs are missing"), "unexpected error: {stderr}");
}

#[test]
fn remove_by_id_prefix() {
    let log = TestLog::initialized(2);
    let date = days_ago(1);
    let stdout = log.ok(&["log", "weight", "80", "--date", &date]);
    let id = stdout
        .split_once('[')
        .and_then(|(_, rest)| rest.split_once(']'))
        .map(|(id, _)| id.to_string())
        .unwrap();

    let removed = log.ok(&["remove", "weight", &id[..6], "--date", &date]);

    assert!(removed.starts_with(&format!("Removed weight 80.0 kg from {date}")));
    let shown = log.show(&date);
    assert!(shown["values"]["weight_kg"].is_null());
    let output = log.run(&["remove", "weight", &id, "--date", &date]);
    assert!(!output.status.success());
}

#[test]
fn dietary_energy_is_shown() {
    let log = TestLog::initialized(3);
    let date = days_ago(2);

    log.ok(&["diet", "fasted", "--date", &date]);
    let text = log.ok(&["show", "--date", &date]);
    assert!(text.contains("Dietary energy  0 kcal (fasted)"), "unexpected output: {text}");

    log.ok(&["diet", "2150", "--date", &days_ago(1)]);
    let shown = log.show(&days_ago(1));
    assert_eq!(shown["day"]["dietary_energy_point"]["kcal"].as_f64(), Some(2150.0));
    assert_eq!(shown["day"]["dietary_energy_point"]["source"], "manual_entry");
}

#[test]
fn dates_outside_the_log_are_rejected() {
    let log = TestLog::initialized(1);

    let before = log.run(&["log", "weight", "80", "--date", &days_ago(5)]);
    let future = log.run(&["diet", "2000", "--date", &(today() + Duration::days(2)).to_string()]);

    assert!(!before.status.success());
    assert!(!future.status.success());
}

#[test]
fn settings_change_aggregation() {
    let log = TestLog::initialized(1);
    log.ok(&["log", "weight", "80", "--time", "07:00:00"]);
    log.ok(&["log", "weight", "82", "--time", "08:00:00"]);
    assert_eq!(log.show(&days_ago(0))["values"]["weight_kg"].as_f64(), Some(82.0));

    let stdout = log.ok(&["settings", "--aggregate", "weight=average"]);

    assert!(stdout.contains("weight          average"), "unexpected output: {stdout}");
    assert_eq!(log.show(&days_ago(0))["values"]["weight_kg"].as_f64(), Some(81.0));
}

#[test]
fn recalc_is_stable() {
    let log = TestLog::initialized(3);
    log.ok(&["log", "weight", "80", "--date", &days_ago(3)]);

    let stdout = log.ok(&["recalc"]);

    assert!(stdout.starts_with("Recalculated 4 days"), "unexpected output: {stdout}");
    assert!(stdout.contains(", 0 changed"), "unexpected output: {stdout}");
}

#[test]
fn sync_requires_external_store() {
    let log = TestLog::initialized(0);

    let output = log.run(&["sync"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no external store configured"), "unexpected error: {stderr}");
}
