//! `file` sender: rendered lines appended to a file.
//!
//! Activation: `{"path": "/var/log/logsend/errors.log"}` (created if absent).
//! Binding: `{"template": "..."}`.

use std::fs::OpenOptions;
use std::path::PathBuf;

use serde_json::Value;

use logsend_core::{RunSettings, SenderError, SenderHandle, SenderKind};

use crate::line::spawn_writer;

pub const FILE_SENDER: &str = "file";

#[derive(Debug, Default, Clone, Copy)]
pub struct FileSender;

impl SenderKind for FileSender {
    fn name(&self) -> &'static str {
        FILE_SENDER
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
            .ok_or_else(|| SenderError::invalid(FILE_SENDER, "'path' must be a non-empty string"))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SenderError::Io { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), "file sender opened output");

        let handle = spawn_writer(FILE_SENDER, tokio::fs::File::from_std(file), settings.dry_run)?;
        Ok(Box::new(handle))
    }

    fn flat_params(&self) -> &'static [&'static str] {
        &["path", "template"]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use logsend_core::Match;

    fn record(msg: &str) -> Match {
        let mut fields = BTreeMap::new();
        fields.insert("msg".to_string(), json!(msg));
        Match::new(fields, format!("ERROR {msg}"))
    }

    #[tokio::test]
    async fn appends_rendered_lines() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("out.log");
        std::fs::write(&out, "existing\n").unwrap();

        let handle = FileSender
            .activate(&json!({"path": out.display().to_string()}), &RunSettings::default())
            .expect("activate");
        let mut binding = handle.bind();
        binding.set_config(&json!({"template": "[{{ msg }}]"})).unwrap();
        binding.send(&record("disk full"));
        binding.send(&record("cpu hot"));
        handle.flush().await.expect("flushed");

        let contents = std::fs::read_to_string(&out).unwrap();
        assert_eq!(contents, "existing\n[disk full]\n[cpu hot]\n");
    }

    #[tokio::test]
    async fn missing_path_is_rejected() {
        let err = FileSender
            .activate(&json!({}), &RunSettings::default())
            .err()
            .expect("rejected");
        assert!(matches!(err, SenderError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn unopenable_path_is_an_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("no").join("such").join("dir.log");
        let err = FileSender
            .activate(&json!({"path": path.display().to_string()}), &RunSettings::default())
            .err()
            .expect("rejected");
        assert!(matches!(err, SenderError::Io { .. }));
    }
}
