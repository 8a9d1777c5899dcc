//! CLI subcommand implementations.

pub mod diet;
mod edit;
pub mod init;
pub mod log;
pub mod recalc;
pub mod remove;
pub mod set;
pub mod settings;
pub mod show;
pub mod sync;
mod util;
