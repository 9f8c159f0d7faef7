//! Routing model: groups of rules, and rules bound to senders.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::registry::Sender;
use crate::types::Match;

/// Capture-name suffixes converted to numbers.
const INT_SUFFIX: &str = "_INT";
const FLOAT_SUFFIX: &str = "_FLOAT";

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A line pattern plus the senders that receive each of its matches.
pub struct Rule {
    pattern: Regex,
    senders: Vec<Box<dyn Sender>>,
}

impl Rule {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            senders: Vec::new(),
        })
    }

    pub fn with_senders(mut self, senders: Vec<Box<dyn Sender>>) -> Self {
        self.senders = senders;
        self
    }

    pub fn push_sender(&mut self, sender: Box<dyn Sender>) {
        self.senders.push(sender);
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn senders(&self) -> &[Box<dyn Sender>] {
        &self.senders
    }

    /// Test `line` against the pattern and collect its named captures.
    ///
    /// Groups that did not participate are left out. A group named
    /// `<key>_INT` or `<key>_FLOAT` is stored under `<key>` as a number when
    /// its text parses; otherwise the raw text is kept.
    pub fn matches(&self, line: &str) -> Option<Match> {
        let caps = self.pattern.captures(line)?;
        let mut fields = BTreeMap::new();
        for (idx, name) in self.pattern.capture_names().enumerate() {
            let (Some(name), Some(m)) = (name, caps.get(idx)) else {
                continue;
            };
            let (key, value) = typed_capture(name, m.as_str());
            fields.insert(key, value);
        }
        let text = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        Some(Match::new(fields, text))
    }

    /// Send `record` to every bound sender, in binding order.
    pub fn dispatch(&self, record: &Match) {
        for sender in &self.senders {
            sender.send(record);
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern.as_str())
            .field(
                "senders",
                &self.senders.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn typed_capture(name: &str, raw: &str) -> (String, Value) {
    if let Some(key) = name.strip_suffix(INT_SUFFIX) {
        let parsed = raw
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| raw.trim().parse::<f64>().ok().map(|f| f as i64));
        return match parsed {
            Some(n) => (key.to_string(), Value::from(n)),
            None => {
                tracing::debug!(capture = %name, value = %raw, "integer capture did not parse");
                (key.to_string(), Value::from(raw))
            }
        };
    }
    if let Some(key) = name.strip_suffix(FLOAT_SUFFIX) {
        return match raw.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => (key.to_string(), Value::from(f)),
            _ => {
                tracing::debug!(capture = %name, value = %raw, "float capture did not parse");
                (key.to_string(), Value::from(raw))
            }
        };
    }
    (name.to_string(), Value::from(raw))
}

/// Evaluate every rule against `line`, in order, without short-circuiting.
/// Returns how many rules matched.
pub fn route_line(line: &str, rules: &[Rule]) -> usize {
    let mut matched = 0;
    for rule in rules {
        if let Some(record) = rule.matches(line) {
            matched += 1;
            rule.dispatch(&record);
        }
    }
    matched
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A file-name mask and the rules applied to every file it selects.
#[derive(Debug)]
pub struct Group {
    mask: Regex,
    rules: Vec<Rule>,
}

impl Group {
    pub fn new(mask: Regex, rules: Vec<Rule>) -> Self {
        Self { mask, rules }
    }

    pub fn mask(&self) -> &Regex {
        &self.mask
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether the mask matches the base name of `path`.
    pub fn selects(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.mask.is_match(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Routing table
// ---------------------------------------------------------------------------

/// One row of [`RoutingTable::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSummary {
    pub group: usize,
    pub mask: String,
    pub pattern: String,
    pub senders: Vec<String>,
}

/// The groups produced by one configuration load, in document order.
#[derive(Debug, Default)]
pub struct RoutingTable {
    groups: Vec<Arc<Group>>,
}

impl RoutingTable {
    pub fn new(groups: Vec<Arc<Group>>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Arc<Group>] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Arc<Group>> {
        self.groups
    }

    pub fn rule_count(&self) -> usize {
        self.groups.iter().map(|g| g.rules().len()).sum()
    }

    /// Route one line through every rule of every group, in order.
    pub fn route_all(&self, line: &str) -> usize {
        self.groups.iter().map(|g| route_line(line, g.rules())).sum()
    }

    pub fn summary(&self) -> Vec<RuleSummary> {
        let mut rows = Vec::new();
        for (idx, group) in self.groups.iter().enumerate() {
            for rule in group.rules() {
                rows.push(RuleSummary {
                    group: idx,
                    mask: group.mask().as_str().to_string(),
                    pattern: rule.pattern().as_str().to_string(),
                    senders: rule.senders().iter().map(|s| s.name().to_string()).collect(),
                });
            }
        }
        rows
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::error::SenderError;

    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<(String, Match)>>>,
    }

    impl Sender for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn set_config(&mut self, _raw: &Value) -> Result<(), SenderError> {
            Ok(())
        }
        fn send(&self, record: &Match) {
            self.seen
                .lock()
                .unwrap()
                .push((self.label.to_string(), record.clone()));
        }
    }

    #[test]
    fn named_groups_round_trip() {
        let rule = Rule::new(r"(?P<a>\w+)=(?P<b>\d+)").unwrap();
        let record = rule.matches("x key=42 y").expect("match");
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("a"), Some(&json!("key")));
        assert_eq!(record.get("b"), Some(&json!("42")));
        assert_eq!(record.text(), "key=42");
        assert!(rule.matches("no equals here").is_none());
    }

    #[test]
    fn non_participating_groups_are_left_out() {
        let rule = Rule::new(r"(?P<level>ERROR|WARN)(?: code=(?P<code>\d+))?").unwrap();
        let record = rule.matches("WARN disk").expect("match");
        assert_eq!(record.len(), 1);
        assert!(record.get("code").is_none());
    }

    #[test]
    fn typed_suffixes_become_numbers() {
        let rule =
            Rule::new(r"took (?P<ms_INT>\S+) ms load (?P<load_FLOAT>\S+) (?P<n_INT>\S+)").unwrap();
        let record = rule.matches("took 12 ms load 0.75 nan-ish").expect("match");
        assert_eq!(record.get("ms"), Some(&json!(12)));
        assert_eq!(record.get("load"), Some(&json!(0.75)));
        assert_eq!(record.get("n"), Some(&json!("nan-ish")), "unparsable kept as text");
    }

    #[test]
    fn float_text_in_int_capture_is_truncated() {
        let rule = Rule::new(r"(?P<v_INT>[\d.]+)").unwrap();
        assert_eq!(rule.matches("3.9").unwrap().get("v"), Some(&json!(3)));
    }

    #[test]
    fn every_rule_is_evaluated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut first = Rule::new("ERROR").unwrap();
        first.push_sender(Box::new(Recorder { label: "first", seen: seen.clone() }));
        let mut second = Rule::new("disk").unwrap();
        second.push_sender(Box::new(Recorder { label: "second-a", seen: seen.clone() }));
        second.push_sender(Box::new(Recorder { label: "second-b", seen: seen.clone() }));
        let rules = vec![first, second];

        assert_eq!(route_line("ERROR disk full", &rules), 2);
        let labels: Vec<String> = seen.lock().unwrap().iter().map(|(l, _)| l.clone()).collect();
        assert_eq!(labels, vec!["first", "second-a", "second-b"]);

        assert_eq!(route_line("all good", &rules), 0);
        assert_eq!(seen.lock().unwrap().len(), 3, "non-matching line sends nothing");
    }

    #[test]
    fn group_mask_applies_to_base_name() {
        let group = Group::new(Regex::new(r"^app\.log$").unwrap(), vec![]);
        assert!(group.selects(Path::new("/var/log/app.log")));
        assert!(!group.selects(Path::new("/var/app.log/other.log")));
        assert!(!group.selects(Path::new("/")));
    }

    #[test]
    fn summary_lists_rules_with_bindings() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut rule = Rule::new("x").unwrap();
        rule.push_sender(Box::new(Recorder { label: "r", seen }));
        let table = RoutingTable::new(vec![Arc::new(Group::new(
            Regex::new(r"\.log").unwrap(),
            vec![rule, Rule::new("y").unwrap()],
        ))]);
        let rows = table.summary();
        assert_eq!(table.rule_count(), 2);
        assert_eq!(rows[0].senders, vec!["recorder"]);
        assert!(rows[1].senders.is_empty());
        assert_eq!(rows[1].mask, r"\.log");
    }
}
