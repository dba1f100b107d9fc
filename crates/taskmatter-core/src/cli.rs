use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskmatter",
    version,
    about = "Process tasks in Markdown YAML front matter",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Config file to use instead of ~/.config/taskmatter/config.toml
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Override the color setting (on/off)
    #[arg(long = "color", global = true)]
    pub color: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show tasks due this week
    #[command(visible_alias = "w")]
    Week(ViewArgs),
    /// Show tasks due this month
    #[command(visible_alias = "m")]
    Month(ViewArgs),
    /// Show tasks without planned or due dates
    #[command(visible_alias = "s")]
    Someday(SomedayArgs),
    /// Add a new task in the current directory
    #[command(visible_alias = "a")]
    Add {
        title: String,
        /// Properties as KEY:VALUE
        props: Vec<String>,
    },
    /// Edit the specified tasks
    #[command(visible_alias = "e")]
    Edit {
        #[arg(required = true)]
        targets: Vec<String>,
        /// Don't search for tasks recursively
        #[arg(short = 'R')]
        non_recursive: bool,
    },
    /// Mark the specified tasks as done
    #[command(visible_alias = "d")]
    Done {
        #[arg(required = true)]
        targets: Vec<String>,
        /// Search for tasks recursively
        #[arg(short = 'r')]
        recursive: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Month(ViewArgs::default())
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    pub paths: Vec<PathBuf>,

    /// Offset INT weeks (or months) from today
    #[arg(short = 'n', value_name = "INT", default_value_t = 0, allow_negative_numbers = true)]
    pub next: i32,

    /// Also show completed tasks
    #[arg(short = 'a')]
    pub all: bool,

    /// Don't search for tasks recursively
    #[arg(short = 'R')]
    pub non_recursive: bool,

    /// Don't cut off empty days or weeks
    #[arg(short = 'T')]
    pub no_trim: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SomedayArgs {
    pub paths: Vec<PathBuf>,

    /// Also show completed tasks
    #[arg(short = 'a')]
    pub all: bool,

    /// Don't search for tasks recursively
    #[arg(short = 'R')]
    pub non_recursive: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli};

    #[test]
    fn parses_week_with_negative_offset() {
        let cli = GlobalCli::try_parse_from(["taskmatter", "w", "-n", "-2", "-a", "-T", "notes"])
            .expect("parse week");
        let Some(Command::Week(args)) = cli.command else {
            panic!("expected week command");
        };
        assert_eq!(args.next, -2);
        assert!(args.all);
        assert!(args.no_trim);
        assert!(!args.non_recursive);
        assert_eq!(args.paths.len(), 1);
    }

    #[test]
    fn no_command_defaults_to_month() {
        let cli = GlobalCli::try_parse_from(["taskmatter", "-v"]).expect("parse");
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command.unwrap_or_default(), Command::Month(_)));
    }

    #[test]
    fn add_collects_props() {
        let cli = GlobalCli::try_parse_from(["taskmatter", "add", "Buy milk", "due:friday", "n:2"])
            .expect("parse add");
        let Some(Command::Add { title, props }) = cli.command else {
            panic!("expected add command");
        };
        assert_eq!(title, "Buy milk");
        assert_eq!(props, vec!["due:friday", "n:2"]);
    }

    #[test]
    fn done_requires_targets() {
        assert!(GlobalCli::try_parse_from(["taskmatter", "done"]).is_err());
    }
}
