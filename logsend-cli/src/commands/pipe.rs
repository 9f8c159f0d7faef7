//! `logsend pipe`: route lines read from standard input.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use tokio::io::BufReader;

use logsend_core::RunSettings;
use logsend_senders::with_builtin_senders;
use logsend_tail::{parse_param, run_pipe, PipeSource};

use super::{block_on, GlobalArgs};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("rules").required(true).args(["config", "regex"])))]
pub struct PipeArgs {
    /// Apply every rule of this configuration document.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["regex", "sender", "params"])]
    pub config: Option<PathBuf>,

    /// Single ad-hoc rule pattern.
    #[arg(long, value_name = "REGEX", requires = "sender")]
    pub regex: Option<String>,

    /// Sender type receiving the ad-hoc rule's matches.
    #[arg(long, value_name = "TYPE", requires = "regex")]
    pub sender: Option<String>,

    /// Sender parameter, repeatable (`--param path=/tmp/out.log`).
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param, requires = "sender")]
    pub params: Vec<(String, String)>,

    /// Render sender output without delivering it.
    #[arg(long)]
    pub dry_run: bool,
}

impl PipeArgs {
    fn source(self) -> Result<PipeSource> {
        if let Some(config) = self.config {
            return Ok(PipeSource::Config(config));
        }
        Ok(PipeSource::AdHoc {
            regex: self.regex.context("--regex is required without --config")?,
            sender: self.sender.context("--sender is required with --regex")?,
            params: self.params,
        })
    }

    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let settings = RunSettings {
            dry_run: self.dry_run,
            debug: global.debug,
            ..RunSettings::default()
        };
        let source = self.source()?;

        let summary = block_on(global, async move {
            let registry = with_builtin_senders().context("failed to register senders")?;
            let stdin = BufReader::new(tokio::io::stdin());
            run_pipe(&source, registry, &settings, stdin)
                .await
                .context("pipe failed")
        })?;

        if !summary.unflushed.is_empty() {
            tracing::warn!(senders = ?summary.unflushed, "some queued records were not delivered");
        }
        tracing::debug!(lines = summary.lines, matched = summary.matched, "pipe finished");
        Ok(())
    }
}
