//! `logsend check`: validate a configuration document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;
use tabled::{settings::Style, Table, Tabled};

use logsend_core::{load_config_file, RuleSummary, RunSettings};
use logsend_senders::with_builtin_senders;

use super::{block_on, GlobalArgs};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Configuration document to validate.
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Emit the routing table as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "group")]
    group: usize,
    #[tabled(rename = "mask")]
    mask: String,
    #[tabled(rename = "regexp")]
    pattern: String,
    #[tabled(rename = "senders")]
    senders: String,
}

impl CheckArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let settings = RunSettings {
            dry_run: true,
            debug: global.debug,
            ..RunSettings::default()
        };
        let config = self.config;
        let rows = block_on(global, async move {
            let mut registry = with_builtin_senders().context("failed to register senders")?;
            let table = load_config_file(&config, &mut registry, &settings)
                .with_context(|| format!("invalid configuration {}", config.display()))?;
            Ok(table.summary())
        })?;

        if self.json {
            print_json(&rows)
        } else {
            print_table(rows);
            Ok(())
        }
    }
}

fn print_table(rows: Vec<RuleSummary>) {
    if rows.is_empty() {
        println!("No rules configured.");
    } else {
        let table_rows: Vec<RuleRow> = rows
            .into_iter()
            .map(|row| RuleRow {
                group: row.group,
                mask: row.mask,
                pattern: row.pattern,
                senders: if row.senders.is_empty() {
                    "-".to_string()
                } else {
                    row.senders.join(", ")
                },
            })
            .collect();
        let mut table = Table::new(table_rows);
        table.with(Style::rounded());
        println!("{table}");
    }
    println!("{}", "ok".green().bold());
}

fn print_json(rows: &[RuleSummary]) -> Result<()> {
    let payload = json!({
        "ok": true,
        "rules": rows
            .iter()
            .map(|row| json!({
                "group": row.group,
                "mask": row.mask,
                "regexp": row.pattern,
                "senders": row.senders,
            }))
            .collect::<Vec<_>>(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize check JSON")?
    );
    Ok(())
}
