use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hl_cli::commands::{diet, init, log, recalc, remove, set, settings, show, sync};
use hl_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match command {
        Commands::Init(args) => init::run(&mut out, args, &config)?,
        Commands::Log(args) => log::run(&mut out, args, &config)?,
        Commands::Remove(args) => remove::run(&mut out, args, &config)?,
        Commands::Set(args) => set::run(&mut out, args, &config)?,
        Commands::Diet(args) => diet::run(&mut out, args, &config)?,
        Commands::Show(args) => show::run(&mut out, args, &config)?,
        Commands::Recalc => recalc::run(&mut out, &config)?,
        Commands::Sync(args) => sync::run(&mut out, args, &config)?,
        Commands::Settings(args) => settings::run(&mut out, args, &config)?,
    }
    out.flush()?;

    Ok(())
}
