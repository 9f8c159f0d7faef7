//! `logsend watch`: tail files and route their lines.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use logsend_core::RunSettings;
use logsend_senders::with_builtin_senders;
use logsend_tail::{run_watch, WatchOptions};

use super::{block_on, GlobalArgs};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directories (walked recursively) or individual files.
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Routing configuration document (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Also tail files created in the given directories after startup.
    #[arg(long)]
    pub continue_watch: bool,

    /// Read files from the start instead of from their current end.
    #[arg(long)]
    pub read_whole_log: bool,

    /// With --read-whole-log: exit once every file has been read.
    #[arg(long)]
    pub read_once: bool,

    /// Render sender output without delivering it.
    #[arg(long)]
    pub dry_run: bool,
}

impl WatchArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let settings = RunSettings {
            continue_watch: self.continue_watch,
            dry_run: self.dry_run,
            read_whole_log: self.read_whole_log,
            read_once: self.read_once,
            debug: global.debug,
        };
        let options = WatchOptions {
            paths: self.paths,
            config: self.config,
            settings,
        };

        let report = block_on(global, async move {
            let registry = with_builtin_senders().context("failed to register senders")?;
            run_watch(options, registry).await.context("watch failed")
        })?;

        if !report.unflushed.is_empty() {
            tracing::warn!(senders = ?report.unflushed, "some queued records were not delivered");
        }
        tracing::info!(
            files = report.files,
            tasks = report.tasks,
            outcome = ?report.outcome,
            "watch finished",
        );
        Ok(())
    }
}
