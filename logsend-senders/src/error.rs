//! Error types for logsend-senders.

use std::error::Error as _;

use thiserror::Error;

use logsend_core::SenderError;

/// Errors from compiling or rendering a record template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),
}

impl TemplateError {
    /// The error and all of its sources on one line; tera nests the useful
    /// part (e.g. the missing variable) a level down.
    pub fn describe(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }

    pub(crate) fn into_sender_error(self, sender: &str) -> SenderError {
        SenderError::Backend {
            sender: sender.to_string(),
            source: Box::new(self),
        }
    }
}
