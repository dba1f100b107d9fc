pub mod bucket;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod format;
pub mod grid;
pub mod props;
pub mod record;
pub mod render;
pub mod store;
pub mod trim;

use std::ffi::OsString;
use std::io;

use chrono::Local;
use clap::Parser;
use tracing::{debug, info};

pub use calendar::Calendar;
pub use datetime::{DateResolver, NaturalDateResolver, ResolvedDate};
pub use record::Record;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting taskmatter CLI"
    );

    let mut cfg = config::Config::load(cli.config.as_deref())?;
    if let Some(color) = cli.color.as_deref() {
        cfg.apply_color_override(color)?;
    }
    debug!(config = ?cfg.loaded_file, "configuration ready");

    let now = Local::now().naive_local();
    let command = cli.command.unwrap_or_default();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::dispatch(&cfg, command, now, &mut out)?;

    info!("done");
    Ok(())
}
