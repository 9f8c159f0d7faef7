use std::path::PathBuf;

use thiserror::Error;

/// Error surface for file discovery, tailing, watching and pipe mode.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("configuration error: {0}")]
    Config(#[from] logsend_core::ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] logsend_core::RegistryError),

    #[error("sender error: {0}")]
    Sender(#[from] logsend_core::SenderError),

    #[error("invalid regexp: {0}")]
    Regex(#[from] regex::Error),

    /// A `key=value` pipe parameter the selected sender does not accept.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> TailError {
    TailError::Io {
        path: path.into(),
        source,
    }
}
