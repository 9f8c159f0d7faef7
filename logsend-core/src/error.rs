//! Error types for logsend-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by sender implementations during activation or binding.
#[derive(Debug, Error)]
pub enum SenderError {
    /// The raw configuration block does not have the shape the sender expects.
    #[error("invalid configuration for sender '{sender}': {reason}")]
    InvalidConfig { sender: String, reason: String },

    /// Filesystem failure while opening the sender's resource.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by the sender's backend (template engine, database, ...).
    #[error("sender '{sender}' backend error: {source}")]
    Backend {
        sender: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SenderError {
    /// Convenience constructor for [`SenderError::InvalidConfig`].
    pub fn invalid(sender: impl Into<String>, reason: impl Into<String>) -> Self {
        SenderError::InvalidConfig {
            sender: sender.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the sender registry lifecycle.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("sender '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("sender '{0}' is not registered")]
    UnknownSender(String),

    /// A second activation would create a second shared resource; it is refused.
    #[error("sender '{0}' is already activated")]
    AlreadyActivated(String),

    #[error("sender '{0}' has not been activated")]
    NotActivated(String),

    #[error("failed to activate sender '{name}': {source}")]
    Activation {
        name: String,
        #[source]
        source: SenderError,
    },
}

/// All errors that can arise while loading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON syntax error, or a value of the wrong shape (serde reports line/column).
    #[error("failed to parse configuration {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("group {group}: invalid mask '{mask}': {source}")]
    Mask {
        group: usize,
        mask: String,
        #[source]
        source: regex::Error,
    },

    #[error("group {group} rule {rule}: invalid regexp '{pattern}': {source}")]
    Pattern {
        group: usize,
        rule: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// `set_config` rejected a rule-level block.
    #[error("group {group} rule {rule}: cannot configure sender '{sender}': {source}")]
    Binding {
        group: usize,
        rule: usize,
        sender: String,
        #[source]
        source: SenderError,
    },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
