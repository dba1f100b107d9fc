use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command as Process;

use anyhow::{Context, anyhow, bail};
use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use crate::calendar::Calendar;
use crate::cli::{Command, SomedayArgs, ViewArgs};
use crate::config::Config;
use crate::datetime::NaturalDateResolver;
use crate::props::parse_properties;
use crate::render::Renderer;
use crate::store::{self, Target};

/// Runs one subcommand against the task files. Anything meant for the user
/// goes to `out`; diagnostics go through tracing.
#[instrument(skip(cfg, out))]
pub fn dispatch(
    cfg: &Config,
    command: Command,
    now: NaiveDateTime,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let resolver = NaturalDateResolver::new(now);
    let calendar = Calendar::new(&resolver, now.date())
        .with_renderer(Renderer::for_stdout(cfg.color));

    match command {
        Command::Week(args) => cmd_week(cfg, &calendar, &args, out),
        Command::Month(args) => cmd_month(cfg, &calendar, &args, out),
        Command::Someday(args) => cmd_someday(cfg, &calendar, &args, out),
        Command::Add { title, props } => {
            let cwd = env::current_dir().context("failed to read current directory")?;
            cmd_add(&cwd, &title, &props, &resolver, out)
        }
        Command::Edit {
            targets,
            non_recursive,
        } => cmd_edit(cfg, &targets, !non_recursive, out),
        Command::Done { targets, recursive } => cmd_done(cfg, &targets, recursive, out),
    }
}

fn cmd_week(
    cfg: &Config,
    calendar: &Calendar<'_, NaturalDateResolver>,
    args: &ViewArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let records = store::load_records(&cfg.search_paths(&args.paths), !args.non_recursive)?;
    let table = calendar
        .render_week(&records, i64::from(args.next), args.all, args.no_trim)
        .ok_or_else(|| anyhow!("week offset {} is out of range", args.next))?;
    print_table(&table, out)
}

fn cmd_month(
    cfg: &Config,
    calendar: &Calendar<'_, NaturalDateResolver>,
    args: &ViewArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let records = store::load_records(&cfg.search_paths(&args.paths), !args.non_recursive)?;
    let table = calendar
        .render_month(&records, args.next, args.all, args.no_trim)
        .ok_or_else(|| anyhow!("month offset {} is out of range", args.next))?;
    print_table(&table, out)
}

fn print_table(table: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    if table.is_empty() {
        debug!("nothing scheduled in range");
        return Ok(());
    }
    writeln!(out, "{table}")?;
    Ok(())
}

fn cmd_someday(
    cfg: &Config,
    calendar: &Calendar<'_, NaturalDateResolver>,
    args: &SomedayArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let records = store::load_records(&cfg.search_paths(&args.paths), !args.non_recursive)?;
    for line in calendar.format_someday(&records, args.all) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Creates the task file in `dir` and reports its id.
#[instrument(skip(resolver, out))]
pub fn cmd_add(
    dir: &Path,
    title: &str,
    props: &[String],
    resolver: &NaturalDateResolver,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let props = parse_properties(props, resolver)?;
    let (path, identifier) = store::create_task(dir, title, props)?;
    info!(file = %path.display(), "task added");
    writeln!(out, "Created task {identifier}: {}", path.display())?;
    Ok(())
}

#[instrument(skip(cfg, out))]
pub fn cmd_done(
    cfg: &Config,
    targets: &[String],
    recursive: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let paths = cfg.search_paths(&[]);
    for target in targets {
        match store::resolve_target(&paths, recursive, target)? {
            Target::Found(path) => {
                store::mark_done(&path)?;
                writeln!(out, "Completed {}", path.display())?;
            }
            missing => report_missing(&missing, out)?,
        }
    }
    Ok(())
}

#[instrument(skip(cfg, out))]
pub fn cmd_edit(
    cfg: &Config,
    targets: &[String],
    recursive: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let paths = cfg.search_paths(&[]);
    let mut found = Vec::new();
    for target in targets {
        match store::resolve_target(&paths, recursive, target)? {
            Target::Found(path) => found.push(path),
            missing => report_missing(&missing, out)?,
        }
    }
    if found.is_empty() {
        return Ok(());
    }
    open_in_editor(&found)
}

fn report_missing(target: &Target, out: &mut dyn Write) -> anyhow::Result<()> {
    match target {
        Target::UnknownIdentifier(id) => writeln!(out, "No task with id: \"{id}\" found")?,
        Target::MissingPath(path) => {
            writeln!(out, "Could not find task \"{}\"", path.display())?;
        }
        Target::Found(_) => {}
    }
    warn!(?target, "task target not found");
    Ok(())
}

/// Editor command lines from `$VISUAL`, then `$EDITOR`, skipping unset or
/// blank variables.
pub fn editor_commands() -> Vec<Vec<String>> {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .map(|raw| raw.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|parts| !parts.is_empty())
        .collect()
}

/// Opens all `files` in the configured editor and waits for it to exit.
pub fn open_in_editor(files: &[PathBuf]) -> anyhow::Result<()> {
    launch_editor(&editor_commands(), files)
}

/// Tries each editor in turn until one exits successfully.
pub fn launch_editor(editors: &[Vec<String>], files: &[PathBuf]) -> anyhow::Result<()> {
    let mut last_err = None;
    for parts in editors {
        let Some((program, args)) = parts.split_first() else {
            continue;
        };
        match run_editor(program, args, files) {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(editor = %program, error = %err, "editor failed; trying the next one");
                last_err = Some(err);
            }
        }
    }
    match last_err {
        Some(err) => Err(err),
        None => bail!("no editor configured; set $VISUAL or $EDITOR"),
    }
}

fn run_editor(program: &str, args: &[String], files: &[PathBuf]) -> anyhow::Result<()> {
    info!(editor = %program, files = files.len(), "opening editor");
    let status = Process::new(program)
        .args(args)
        .args(files)
        .status()
        .with_context(|| format!("failed to run editor {program}"))?;

    if !status.success() {
        bail!(
            "editor {program} exited with status {}",
            status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
    }
    Ok(())
}
