//! Run settings and the match record passed to senders.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Run settings
// ---------------------------------------------------------------------------

/// Run-mode flags, built once from the command line and passed by reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSettings {
    /// Watch the given directories for newly created files.
    pub continue_watch: bool,
    /// Senders render their output but do not deliver it.
    pub dry_run: bool,
    /// Start reading files at offset 0 instead of at their current end.
    pub read_whole_log: bool,
    /// Stop at end of file instead of following.
    pub read_once: bool,
    pub debug: bool,
}

impl RunSettings {
    /// How tail sources are opened under these settings.
    ///
    /// `read_once` only takes effect together with `read_whole_log`; on its
    /// own the files are still followed from their end.
    pub fn read_mode(&self) -> ReadMode {
        match (self.read_whole_log, self.read_once) {
            (true, true) => ReadMode::WholeOnce,
            (true, false) => ReadMode::WholeFollow,
            (false, _) => ReadMode::FollowFromEnd,
        }
    }
}

/// How a tail source is opened and whether it follows new writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadMode {
    /// Read from offset 0 and finish at end of file.
    WholeOnce,
    /// Read from offset 0, then follow writes and rotation.
    WholeFollow,
    /// Seek to the current end, then follow writes and rotation.
    FollowFromEnd,
}

impl ReadMode {
    pub fn follows(&self) -> bool {
        !matches!(self, ReadMode::WholeOnce)
    }

    pub fn starts_at_end(&self) -> bool {
        matches!(self, ReadMode::FollowFromEnd)
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::WholeOnce => write!(f, "whole-once"),
            ReadMode::WholeFollow => write!(f, "whole-follow"),
            ReadMode::FollowFromEnd => write!(f, "follow-from-end"),
        }
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// Named captures of one successful rule match.
///
/// `fields` holds only the named groups that participated in the match;
/// the full matched text is kept apart in `text`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    fields: BTreeMap<String, Value>,
    #[serde(skip)]
    text: String,
}

impl Match {
    pub fn new(fields: BTreeMap<String, Value>, text: impl Into<String>) -> Self {
        Self {
            fields,
            text: text.into(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Shortcut for string-valued captures.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// The full text matched by the rule pattern.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
