//! Configuration document decoding and interpretation.
//!
//! # Document shape
//!
//! ```json
//! {
//!   "sqlite": { "path": "/var/lib/logsend/events.db" },
//!   "groups": [
//!     {
//!       "mask": "access\\.log$",
//!       "rules": [
//!         { "regexp": "GET (?P<url>\\S+)", "sqlite": { "query": "insert ..." } }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Top-level keys other than `groups` are sender activation blocks; rule keys
//! other than `regexp` are per-rule sender blocks. `rules` is accepted in
//! place of the top-level `groups` key.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::registry::SenderRegistry;
use crate::routing::{Group, RoutingTable, Rule};
use crate::types::RunSettings;

// ---------------------------------------------------------------------------
// Typed document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDocument {
    #[serde(default, alias = "rules")]
    pub groups: Vec<GroupDef>,
    /// Activation blocks keyed by sender type.
    #[serde(flatten)]
    pub senders: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDef {
    pub mask: String,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleDef {
    pub regexp: String,
    /// Per-rule blocks keyed by sender type.
    #[serde(flatten)]
    pub bindings: BTreeMap<String, Value>,
}

impl ConfigDocument {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            origin: "<inline>".to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// Activate the senders named in `doc` and build the routing table.
///
/// A rule block for a sender type that is not activated (whether because the
/// document has no activation block for it or because it is not registered)
/// produces no binding.
pub fn interpret(
    doc: &ConfigDocument,
    registry: &mut SenderRegistry,
    settings: &RunSettings,
) -> Result<RoutingTable, ConfigError> {
    for (name, raw) in &doc.senders {
        if registry.is_registered(name) {
            registry.activate(name, raw, settings)?;
        } else {
            tracing::debug!(key = %name, "top-level key is not a registered sender; ignored");
        }
    }

    let mut groups = Vec::with_capacity(doc.groups.len());
    for (group_idx, group_def) in doc.groups.iter().enumerate() {
        let mask = Regex::new(&group_def.mask).map_err(|source| ConfigError::Mask {
            group: group_idx,
            mask: group_def.mask.clone(),
            source,
        })?;

        let mut rules = Vec::with_capacity(group_def.rules.len());
        for (rule_idx, rule_def) in group_def.rules.iter().enumerate() {
            let mut rule = Rule::new(&rule_def.regexp).map_err(|source| ConfigError::Pattern {
                group: group_idx,
                rule: rule_idx,
                pattern: rule_def.regexp.clone(),
                source,
            })?;

            for (sender, block) in &rule_def.bindings {
                if !registry.is_activated(sender) {
                    tracing::debug!(
                        sender = %sender,
                        group = group_idx,
                        rule = rule_idx,
                        "sender not activated; binding skipped",
                    );
                    continue;
                }
                let mut instance = registry.new_instance(sender)?;
                instance
                    .set_config(block)
                    .map_err(|source| ConfigError::Binding {
                        group: group_idx,
                        rule: rule_idx,
                        sender: sender.clone(),
                        source,
                    })?;
                rule.push_sender(instance);
            }
            rules.push(rule);
        }
        groups.push(Arc::new(Group::new(mask, rules)));
    }

    let table = RoutingTable::new(groups);
    tracing::debug!(
        groups = table.groups().len(),
        rules = table.rule_count(),
        "configuration interpreted",
    );
    Ok(table)
}

/// `ConfigDocument::from_file` followed by [`interpret`].
pub fn load_config_file(
    path: &Path,
    registry: &mut SenderRegistry,
    settings: &RunSettings,
) -> Result<RoutingTable, ConfigError> {
    let doc = ConfigDocument::from_file(path)?;
    interpret(&doc, registry, settings)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
