//! `stdout` sender: one rendered line per record on standard output.

use serde_json::Value;

use logsend_core::{RunSettings, SenderError, SenderHandle, SenderKind};

use crate::line::spawn_writer;

pub const STDOUT_SENDER: &str = "stdout";

/// Activation takes an empty object; bindings take `{"template": "..."}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSender;

impl SenderKind for StdoutSender {
    fn name(&self) -> &'static str {
        STDOUT_SENDER
    }

    fn activate(
        &self,
        raw: &Value,
        settings: &RunSettings,
    ) -> Result<Box<dyn SenderHandle>, SenderError> {
        if !(raw.is_object() || raw.is_null()) {
            return Err(SenderError::invalid(STDOUT_SENDER, "expected an object"));
        }
        let handle = spawn_writer(STDOUT_SENDER, tokio::io::stdout(), settings.dry_run)?;
        Ok(Box::new(handle))
    }

    fn flat_params(&self) -> &'static [&'static str] {
        &["template"]
    }
}
