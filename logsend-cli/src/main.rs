//! logsend: tail log files, match lines against regex rules, ship matches.
//!
//! # Usage
//!
//! ```text
//! logsend [--debug] [--log <file>] [--log-format text|json] [--max-procs <n>] watch <path>... --config <file>
//!         [--continue-watch] [--read-whole-log] [--read-once] [--dry-run]
//! logsend pipe --config <file> [--dry-run]
//! logsend pipe --regex <re> --sender <type> [--param key=value]... [--dry-run]
//! logsend check --config <file> [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use commands::{check::CheckArgs, pipe::PipeArgs, watch::WatchArgs, GlobalArgs};
use logsend_tail::LogFormat;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "logsend",
    version,
    about = "Tail log files, match lines against regex rules, and send the matches on",
    long_about = None,
)]
struct Cli {
    /// Debug-level program logs (RUST_LOG takes precedence).
    #[arg(long, global = true)]
    debug: bool,

    /// Append program logs to this file instead of stderr.
    #[arg(long, global = true, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Program log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,

    /// Maximum number of runtime worker threads.
    #[arg(long, global = true, value_name = "N")]
    max_procs: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tail files under the given paths and route their lines.
    Watch(WatchArgs),

    /// Route lines read from standard input.
    Pipe(PipeArgs),

    /// Validate a configuration document and print its routing table.
    Check(CheckArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    logsend_tail::init_tracing(cli.debug, cli.log.as_deref(), cli.log_format.into())
        .context("failed to set up program logging")?;

    let global = GlobalArgs {
        debug: cli.debug,
        max_procs: cli.max_procs,
    };
    let result = match cli.command {
        Commands::Watch(args) => args.run(&global),
        Commands::Pipe(args) => args.run(&global),
        Commands::Check(args) => args.run(&global),
    };
    if let Err(err) = &result {
        tracing::error!(error = %format!("{err:#}"), "logsend failed");
    }
    result
}
