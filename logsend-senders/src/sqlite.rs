//! `sqlite` sender: templated SQL executed per record.
//!
//! Activation opens one connection (`{"path": "events.db"}`, or `":memory:"`)
//! and starts a single writer thread that owns it. Each binding renders its
//! `query` template (a string, or an array of strings joined in order) and
//! queues the result. The writer splits the text on `;` and runs every
//! non-empty statement inside one transaction; any failure rolls the whole
//! record back.
//!
//! The split happens after rendering and knows nothing about SQL quoting, so
//! a captured value containing `;` cuts its statement in two and the record
//! is rolled back. Keep `;` out of interpolated values (capture with a
//! pattern that excludes it) when the query embeds them.

use std::path::PathBuf;

use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use logsend_core::{Match, RunSettings, Sender, SenderError, SenderHandle, SenderKind};

use crate::queue::{Envelope, Queue};
use crate::template::{compile_template, RecordTemplate};

pub const SQLITE_SENDER: &str = "sqlite";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteSender;

impl SenderKind for SqliteSender {
    fn name(&self) -> &'static str {
        SQLITE_SENDER
    }

    fn activate(
        &self,
        raw: &Value,
        settings: &RunSettings,
    ) -> Result<Box<dyn SenderHandle>, SenderError> {
        let path = raw
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                SenderError::invalid(SQLITE_SENDER, "'path' must be a non-empty string")
            })?;

        let conn = Connection::open(&path).map_err(|source| SenderError::Backend {
            sender: SQLITE_SENDER.to_string(),
            source: Box::new(source),
        })?;

        let (queue, rx) = Queue::channel(SQLITE_SENDER);
        let dry_run = settings.dry_run;
        std::thread::Builder::new()
            .name("logsend-sqlite".to_string())
            .spawn(move || run_queue(conn, rx, dry_run))
            .map_err(|source| SenderError::Io { path: path.clone(), source })?;

        tracing::info!(path = %path.display(), dry_run, "sqlite queue started");
        Ok(Box::new(SqliteHandle { queue }))
    }

    fn flat_params(&self) -> &'static [&'static str] {
        &["path", "query"]
    }
}

struct SqliteHandle {
    queue: Queue<String>,
}

impl SenderHandle for SqliteHandle {
    fn bind(&self) -> Box<dyn Sender> {
        Box::new(SqliteBinding {
            queue: self.queue.clone(),
            query: None,
        })
    }

    fn flush(&self) -> oneshot::Receiver<()> {
        self.queue.flush()
    }
}

struct SqliteBinding {
    queue: Queue<String>,
    query: Option<RecordTemplate>,
}

impl Sender for SqliteBinding {
    fn name(&self) -> &str {
        SQLITE_SENDER
    }

    fn set_config(&mut self, raw: &Value) -> Result<(), SenderError> {
        let query = compile_template(SQLITE_SENDER, raw, "query")?
            .ok_or_else(|| SenderError::invalid(SQLITE_SENDER, "'query' is required"))?;
        self.query = Some(query);
        tracing::debug!("set config to sqlite sender");
        Ok(())
    }

    fn send(&self, record: &Match) {
        let Some(query) = &self.query else {
            tracing::warn!("sqlite binding has no query; record dropped");
            return;
        };
        match query.render(record) {
            Ok(script) => self.queue.push(script),
            Err(err) => tracing::warn!(
                error = %err.describe(),
                fields = ?record.fields(),
                "sqlite template error; record dropped",
            ),
        }
    }
}

fn run_queue(mut conn: Connection, mut rx: mpsc::UnboundedReceiver<Envelope<String>>, dry_run: bool) {
    while let Some(envelope) = rx.blocking_recv() {
        match envelope {
            Envelope::Record(script) => {
                tracing::debug!(query = %script, "sqlite exec query");
                if dry_run {
                    continue;
                }
                if let Err(err) = execute_script(&mut conn, &script) {
                    tracing::warn!(error = %err, query = %script, "sqlite rollback");
                }
            }
            Envelope::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::info!("sqlite queue stopped");
}

/// Run every `;`-separated statement of `script` in one transaction.
/// Returns the number of statements executed. A `;` inside a string
/// literal also splits.
pub fn execute_script(conn: &mut Connection, script: &str) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    let mut executed = 0;
    for statement in script.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        tx.execute_batch(statement)?;
        executed += 1;
    }
    tx.commit()?;
    Ok(executed)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
