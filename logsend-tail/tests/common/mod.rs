//! Shared fixtures: a sender that collects matches in memory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use logsend_core::{Match, RunSettings, Sender, SenderError, SenderHandle, SenderKind, SenderRegistry};
use serde_json::Value;
use tokio::sync::oneshot;

pub type Seen = Arc<Mutex<Vec<Match>>>;

pub struct CollectKind {
    seen: Seen,
}

struct CollectHandle {
    seen: Seen,
}

struct CollectSender {
    seen: Seen,
}

impl SenderKind for CollectKind {
    fn name(&self) -> &'static str {
        "sink"
    }

    fn activate(
        &self,
        _raw: &Value,
        _settings: &RunSettings,
    ) -> Result<Box<dyn SenderHandle>, SenderError> {
        Ok(Box::new(CollectHandle { seen: self.seen.clone() }))
    }

    fn flat_params(&self) -> &'static [&'static str] {
        &["label", "verbose"]
    }
}

impl SenderHandle for CollectHandle {
    fn bind(&self) -> Box<dyn Sender> {
        Box::new(CollectSender { seen: self.seen.clone() })
    }

    fn flush(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        rx
    }
}

impl Sender for CollectSender {
    fn name(&self) -> &str {
        "sink"
    }

    fn set_config(&mut self, _raw: &Value) -> Result<(), SenderError> {
        Ok(())
    }

    fn send(&self, record: &Match) {
        self.seen.lock().unwrap().push(record.clone());
    }
}

/// A registry holding only the `sink` collector.
pub fn sink_registry() -> (SenderRegistry, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = SenderRegistry::new();
    registry
        .register(CollectKind { seen: seen.clone() })
        .expect("register sink");
    (registry, seen)
}

pub fn write_config(dir: &Path, doc: &Value) -> PathBuf {
    let path = dir.join("config.json");
    std::fs::write(&path, doc.to_string()).expect("write config");
    path
}

/// Poll `seen` until it holds at least `count` matches.
pub async fn wait_for(seen: &Seen, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while seen.lock().unwrap().len() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {count} matches"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
