//! Tera templates rendered from a [`Match`].
//!
//! The rendering context holds every match field by name plus:
//!
//! | Variable | Value                               |
//! |----------|-------------------------------------|
//! | `_line`  | full text matched by the rule       |
//! | `_now`   | current time, RFC 3339 (UTC)        |
//!
//! Go-style placeholders (`{{.msg}}`) are rewritten to tera's `{{ msg }}`
//! before compiling, so older configuration documents keep working.

use std::borrow::Cow;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use tera::{Context, Tera};

use logsend_core::{Match, SenderError};

use crate::error::TemplateError;

const TEMPLATE_NAME: &str = "record";

fn go_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("static placeholder regex")
    })
}

/// Rewrite `{{.name}}` placeholders to `{{ name }}`.
pub fn normalize_placeholders(source: &str) -> Cow<'_, str> {
    go_placeholder().replace_all(source, "{{ $1 }}")
}

/// Build the tera context for one record.
pub fn record_context(record: &Match) -> Context {
    let mut ctx = Context::new();
    for (key, value) in record.fields() {
        ctx.insert(key.as_str(), value);
    }
    ctx.insert("_line", record.text());
    ctx.insert("_now", &Utc::now().to_rfc3339());
    ctx
}

/// A compiled per-rule template.
#[derive(Debug, Clone)]
pub struct RecordTemplate {
    tera: Tera,
    source: String,
}

impl RecordTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(TEMPLATE_NAME, &normalize_placeholders(source))?;
        Ok(Self {
            tera,
            source: source.to_string(),
        })
    }

    /// The template text as configured (before placeholder rewriting).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, record: &Match) -> Result<String, TemplateError> {
        Ok(self.tera.render(TEMPLATE_NAME, &record_context(record))?)
    }
}

/// Read template text from `raw[key]`: a string, or an array of strings
/// concatenated in order. `Ok(None)` when the key is absent or null.
pub fn template_source(sender: &str, raw: &Value, key: &str) -> Result<Option<String>, SenderError> {
    let map = match raw {
        Value::Object(map) => map,
        Value::Null => return Ok(None),
        other => {
            return Err(SenderError::invalid(
                sender,
                format!("expected an object, got {other}"),
            ))
        }
    };
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(Value::Array(parts)) => {
            let mut text = String::new();
            for part in parts {
                let Some(part) = part.as_str() else {
                    return Err(SenderError::invalid(
                        sender,
                        format!("'{key}' array must contain only strings"),
                    ));
                };
                text.push_str(part);
            }
            Ok(Some(text))
        }
        Some(other) => Err(SenderError::invalid(
            sender,
            format!("'{key}' must be a string or an array of strings, got {other}"),
        )),
    }
}

/// [`template_source`] + [`RecordTemplate::parse`].
pub fn compile_template(
    sender: &str,
    raw: &Value,
    key: &str,
) -> Result<Option<RecordTemplate>, SenderError> {
    template_source(sender, raw, key)?
        .map(|text| RecordTemplate::parse(&text).map_err(|e| e.into_sender_error(sender)))
        .transpose()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
