//! Sync command for reconciling with the external health store.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use hl_sync::{CancelToken, SyncOrchestrator, SyncReport};
use tokio::sync::Mutex;

use crate::Config;
use crate::commands::util;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Output the report as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &SyncArgs, config: &Config) -> Result<()> {
    let store = config.external_store()?.context(
        "no external store configured; set external_url and external_token in the config",
    )?;
    let db = util::open_database(config)?;
    let settings = util::load_settings(&db)?;
    let today = util::today(&settings);

    let runtime = util::runtime()?;
    let report = runtime.block_on(async {
        let local = Arc::new(Mutex::new(db));
        SyncOrchestrator::new(store)
            .sync(&local, today, &CancelToken::new())
            .await
    })?;

    write_report(writer, &report, args.json)
}

fn write_report<W: Write>(writer: &mut W, report: &SyncReport, json: bool) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(report)?)?;
        return Ok(());
    }
    writeln!(writer, "Imported:           {}", report.imported)?;
    writeln!(writer, "Removed:            {}", report.removed)?;
    writeln!(writer, "Exported:           {}", report.exported)?;
    writeln!(writer, "Deleted externally: {}", report.deleted_externally)?;
    writeln!(writer, "Days saved:         {}", report.days_saved)?;
    if report.failed_fetches > 0 || report.failed_writes > 0 {
        writeln!(
            writer,
            "Failures:           {} fetches, {} writes (see log)",
            report.failed_fetches, report.failed_writes
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    #[test]
    fn sync_requires_store_config() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("hl.db"),
            ..Config::default()
        };

        let err = run(&mut Vec::new(), &SyncArgs { json: false }, &config).unwrap_err();

        assert!(err.to_string().contains("no external store configured"));
    }

    #[test]
    fn report_lists_failures() {
        let report = SyncReport {
            imported: 2,
            exported: 1,
            days_saved: 3,
            failed_fetches: 1,
            ..SyncReport::default()
        };
        let mut output = Vec::new();
        write_report(&mut output, &report, false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Imported:           2
        Removed:            0
        Exported:           1
        Deleted externally: 0
        Days saved:         3
        Failures:           1 fetches, 0 writes (see log)
        ");
    }
}
