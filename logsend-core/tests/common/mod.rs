//! Recording sender shared by the integration tests.

use std::sync::{Arc, Mutex};

use logsend_core::{Match, RunSettings, Sender, SenderError, SenderHandle, SenderKind};
use serde_json::Value;
use tokio::sync::oneshot;

/// One `send` call: the binding's template and the match it received.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub sender: String,
    pub template: Option<String>,
    pub record: Match,
}

pub type Log = Arc<Mutex<Vec<Delivery>>>;

pub struct RecordingKind {
    pub name: &'static str,
    pub log: Log,
}

impl RecordingKind {
    pub fn new(name: &'static str) -> (Self, Log) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        (Self { name, log: log.clone() }, log)
    }
}

struct RecordingHandle {
    name: &'static str,
    log: Log,
}

struct RecordingSender {
    name: &'static str,
    template: Option<String>,
    log: Log,
}

impl SenderKind for RecordingKind {
    fn name(&self) -> &'static str {
        self.name
    }

    fn activate(
        &self,
        _raw: &Value,
        _settings: &RunSettings,
    ) -> Result<Box<dyn SenderHandle>, SenderError> {
        Ok(Box::new(RecordingHandle { name: self.name, log: self.log.clone() }))
    }

    fn flat_params(&self) -> &'static [&'static str] {
        &["template"]
    }
}

impl SenderHandle for RecordingHandle {
    fn bind(&self) -> Box<dyn Sender> {
        Box::new(RecordingSender { name: self.name, template: None, log: self.log.clone() })
    }

    fn flush(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        rx
    }
}

impl Sender for RecordingSender {
    fn name(&self) -> &str {
        self.name
    }

    fn set_config(&mut self, raw: &Value) -> Result<(), SenderError> {
        if raw.get("reject").and_then(Value::as_bool) == Some(true) {
            return Err(SenderError::invalid(self.name, "rejected by test"));
        }
        self.template = raw.get("template").and_then(Value::as_str).map(str::to_owned);
        Ok(())
    }

    fn send(&self, record: &Match) {
        self.log.lock().unwrap().push(Delivery {
            sender: self.name.to_string(),
            template: self.template.clone(),
            record: record.clone(),
        });
    }
}
