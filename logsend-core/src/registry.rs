//! Sender capability and the sender registry.
//!
//! # Lifecycle
//!
//! ```text
//! register(kind)            once per sender type, at startup
//! activate(name, raw)       once per type, creates the shared resource handle
//! new_instance(name)        once per rule binding, returns a fresh Sender
//! ```
//!
//! A [`SenderKind`] creates a [`SenderHandle`] on activation. The handle owns
//! (or references) the shared resource, such as a database connection and its
//! work queue; every [`Sender`] it binds refers to that resource and only holds
//! its own per-rule formatting.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{RegistryError, SenderError};
use crate::types::{Match, RunSettings};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// A per-rule sender binding.
pub trait Sender: Send + Sync {
    /// Stable identifier; equal to the registry key of its type.
    fn name(&self) -> &str;

    /// Apply the rule-level configuration block.
    fn set_config(&mut self, raw: &Value) -> Result<(), SenderError>;

    /// Fire-and-forget dispatch of one match. Delivery failures are the
    /// sender's own business and are never reported back.
    fn send(&self, record: &Match);
}

/// The shared resource created by activating a sender type.
pub trait SenderHandle: Send + Sync {
    /// Produce a fresh, unconfigured binding.
    fn bind(&self) -> Box<dyn Sender>;

    /// Resolves once every record queued before this call has been handled.
    fn flush(&self) -> oneshot::Receiver<()>;
}

/// A registrable sender type.
pub trait SenderKind: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-time initialization of the shared resource.
    fn activate(
        &self,
        raw: &Value,
        settings: &RunSettings,
    ) -> Result<Box<dyn SenderHandle>, SenderError>;

    /// Keys accepted as flat `key=value` parameters in pipe mode.
    fn flat_params(&self) -> &'static [&'static str] {
        &[]
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Registration {
    kind: Box<dyn SenderKind>,
    handle: Option<Box<dyn SenderHandle>>,
}

/// Table of sender types keyed by name. Iteration order is the sorted name
/// order, which keeps activation and binding deterministic.
#[derive(Default)]
pub struct SenderRegistry {
    entries: BTreeMap<String, Registration>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sender type. Names must be unique.
    pub fn register<K: SenderKind + 'static>(&mut self, kind: K) -> Result<(), RegistryError> {
        let name = kind.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        tracing::debug!(sender = %name, "registered sender");
        self.entries.insert(
            name,
            Registration {
                kind: Box::new(kind),
                handle: None,
            },
        );
        Ok(())
    }

    /// Run the type's one-time activation with `raw`.
    ///
    /// A second call for the same type is rejected with
    /// [`RegistryError::AlreadyActivated`] and leaves the first handle in place.
    pub fn activate(
        &mut self,
        name: &str,
        raw: &Value,
        settings: &RunSettings,
    ) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownSender(name.to_string()))?;
        if entry.handle.is_some() {
            return Err(RegistryError::AlreadyActivated(name.to_string()));
        }
        let handle = entry
            .kind
            .activate(raw, settings)
            .map_err(|source| RegistryError::Activation {
                name: name.to_string(),
                source,
            })?;
        entry.handle = Some(handle);
        tracing::info!(sender = %name, dry_run = settings.dry_run, "sender activated");
        Ok(())
    }

    /// A new binding from an activated sender type.
    pub fn new_instance(&self, name: &str) -> Result<Box<dyn Sender>, RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSender(name.to_string()))?;
        entry
            .handle
            .as_ref()
            .map(|handle| handle.bind())
            .ok_or_else(|| RegistryError::NotActivated(name.to_string()))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_activated(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|entry| entry.handle.is_some())
            .unwrap_or(false)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn flat_params(&self, name: &str) -> Result<&'static [&'static str], RegistryError> {
        self.entries
            .get(name)
            .map(|entry| entry.kind.flat_params())
            .ok_or_else(|| RegistryError::UnknownSender(name.to_string()))
    }

    /// Wait for every activated sender to drain what has been queued so far,
    /// giving up after `timeout`. Returns the names that did not finish in time.
    pub async fn flush(&self, timeout: Duration) -> Vec<String> {
        let pending: Vec<(String, oneshot::Receiver<()>)> = self
            .entries
            .iter()
            .filter_map(|(name, entry)| {
                entry
                    .handle
                    .as_ref()
                    .map(|handle| (name.clone(), handle.flush()))
            })
            .collect();

        let deadline = tokio::time::Instant::now() + timeout;
        let mut unfinished = Vec::new();
        for (name, rx) in pending {
            match tokio::time::timeout_at(deadline, rx).await {
                Ok(_) => tracing::debug!(sender = %name, "sender queue flushed"),
                Err(_) => {
                    tracing::warn!(sender = %name, "sender queue not flushed before timeout");
                    unfinished.push(name);
                }
            }
        }
        unfinished
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
