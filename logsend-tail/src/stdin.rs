//! Pipe mode: route lines read from an input stream.
//!
//! Two ways to build the rules:
//!
//! - [`PipeSource::Config`]: every rule of every group of a configuration
//!   document, in document order (masks are not consulted);
//! - [`PipeSource::AdHoc`]: one pattern bound to one sender, configured from
//!   flat `key=value` parameters.

use std::path::PathBuf;

use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use logsend_core::{load_config_file, route_line, RoutingTable, Rule, RunSettings, SenderRegistry};

use crate::error::{io_err, TailError};
use crate::runtime::FLUSH_TIMEOUT;

#[derive(Debug, Clone)]
pub enum PipeSource {
    Config(PathBuf),
    AdHoc {
        regex: String,
        sender: String,
        params: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeSummary {
    pub lines: u64,
    pub matched: u64,
    pub unflushed: Vec<String>,
}

/// Parse one `key=value` argument.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

/// Build the configuration object for `sender` from flat parameters.
///
/// Keys must be among `accepted`; the values `true` and `false` become
/// booleans, everything else stays a string.
pub fn flat_config(
    sender: &str,
    accepted: &[&str],
    params: &[(String, String)],
) -> Result<Value, TailError> {
    let mut map = Map::new();
    for (key, value) in params {
        if !accepted.contains(&key.as_str()) {
            return Err(TailError::InvalidParam(format!(
                "sender '{sender}' does not accept '{key}' (accepted: {})",
                accepted.join(", ")
            )));
        }
        let value = match value.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        };
        map.insert(key.clone(), value);
    }
    Ok(Value::Object(map))
}

enum Routes {
    Table(RoutingTable),
    Single(Rule),
}

impl Routes {
    fn route(&self, line: &str) -> usize {
        match self {
            Routes::Table(table) => table.route_all(line),
            Routes::Single(rule) => route_line(line, std::slice::from_ref(rule)),
        }
    }
}

fn build_routes(
    source: &PipeSource,
    registry: &mut SenderRegistry,
    settings: &RunSettings,
) -> Result<Routes, TailError> {
    match source {
        PipeSource::Config(path) => {
            let table = load_config_file(path, registry, settings)?;
            tracing::debug!(rules = table.rule_count(), "pipe rules loaded");
            Ok(Routes::Table(table))
        }
        PipeSource::AdHoc {
            regex,
            sender,
            params,
        } => {
            let accepted = registry.flat_params(sender)?;
            let raw = flat_config(sender, accepted, params)?;
            let mut rule = Rule::new(regex)?;
            registry.activate(sender, &raw, settings)?;
            let mut instance = registry.new_instance(sender)?;
            instance.set_config(&raw)?;
            rule.push_sender(instance);
            tracing::debug!(sender = %sender, pattern = %regex, "pipe rule built");
            Ok(Routes::Single(rule))
        }
    }
}

/// Route every line of `input` until end of input, then flush the senders.
pub async fn run_pipe<R>(
    source: &PipeSource,
    mut registry: SenderRegistry,
    settings: &RunSettings,
    mut input: R,
) -> Result<PipeSummary, TailError>
where
    R: AsyncBufRead + Unpin,
{
    let routes = build_routes(source, &mut registry, settings)?;

    let mut summary = PipeSummary::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = input
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| io_err("<stdin>", e))?;
        if n == 0 {
            break;
        }
        let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        summary.lines += 1;
        summary.matched += routes.route(&String::from_utf8_lossy(line)) as u64;
    }
    tracing::info!(lines = summary.lines, matched = summary.matched, "end of input");

    summary.unflushed = registry.flush(FLUSH_TIMEOUT).await;
    Ok(summary)
}
