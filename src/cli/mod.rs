use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::timestamp::parse_zone;

pub mod commands;

use self::commands::{DashboardArgs, NormalizeArgs, ScheduleArgs, StatusArgs, WatchArgs};

#[derive(Parser, Debug)]
#[command(
    name = "postdash",
    version,
    about = "Scheduled post lifecycle and dashboard statistics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over POSTDASH_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over POSTDASH_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Fixed UTC offset for calendar days and wall-clock times, e.g. +07:00
    #[arg(long, global = true)]
    pub zone: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print dashboard statistics for a posts export (default)
    Dashboard(DashboardArgs),
    /// List every post with its lifecycle status
    Status(StatusArgs),
    /// Print the canonical UTC form of raw timestamps
    Normalize(NormalizeArgs),
    /// Convert and validate schedule editor input
    Schedule(ScheduleArgs),
    /// Re-aggregate the dashboard on every clock tick or export change
    Watch(WatchArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("POSTDASH_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("POSTDASH_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let mut config = loader.load_or_init()?;
    if let Some(zone) = cli.zone {
        parse_zone(&zone).with_context(|| format!("reading --zone {zone}"))?;
        config.display.zone = zone;
    }

    let config = Arc::new(config);
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Dashboard(DashboardArgs::default()));
    match command {
        Commands::Dashboard(args) => commands::show_dashboard(config, &paths, args),
        Commands::Status(args) => commands::show_status(config, &paths, args),
        Commands::Normalize(args) => commands::normalize_timestamps(args),
        Commands::Schedule(args) => commands::handle_schedule_command(config, args),
        Commands::Watch(args) => commands::watch_dashboard(config, &paths, args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
