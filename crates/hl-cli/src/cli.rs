//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{
    diet::DietArgs, init::InitArgs, log::LogArgs, remove::RemoveArgs, set::SetArgs,
    settings::SettingsArgs, show::ShowArgs, sync::SyncArgs,
};

/// Personal health log.
///
/// Records body measurements and dietary energy per day, recalculates
/// derived values such as resting energy and maintenance calories, and
/// keeps measurements in sync with an external health store.
#[derive(Debug, Parser)]
#[command(name = "hl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the log, or move its start date.
    Init(InitArgs),

    /// Record a body measurement.
    Log(LogArgs),

    /// Delete a measurement by ID prefix.
    Remove(RemoveArgs),

    /// Set a characteristic or maintenance option from a day onward.
    Set(SetArgs),

    /// Record a day's dietary energy.
    Diet(DietArgs),

    /// Show a day's records and computed values.
    Show(ShowArgs),

    /// Recalculate every day from the log start through today.
    Recalc,

    /// Sync with the external health store.
    Sync(SyncArgs),

    /// Show or change log settings.
    Settings(SettingsArgs),
}
