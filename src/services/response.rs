//! Turning model output into translations.
//!
//! Models are asked for bare JSON but regularly wrap it in a code fence or emit
//! almost-JSON with unescaped quotes. Parsing is two-staged: a strict JSON parse
//! yielding [`ParseOutcome`], then for single-text calls a targeted extractor over
//! the raw text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::BackendError;
use crate::model::StringMap;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```").unwrap());

static TRANSLATED_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"translated"\s*:\s*"(.*)"\s*\}\s*$"#).unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Value),
    Malformed(String),
}

/// Strip a surrounding (or embedded) fenced code block, if any.
pub fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match FENCE_RE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

pub fn parse_payload(raw: &str) -> ParseOutcome {
    let body = strip_fence(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(v) => ParseOutcome::Parsed(v),
        Err(_) => ParseOutcome::Malformed(body.to_string()),
    }
}

/// Flat object keyed like the input batch.
///
/// A `{"translations": {...}}` envelope is unwrapped unless the batch itself has a
/// `translations` key. Non-string values are ignored and surface later as missing keys.
pub fn parse_batch(raw: &str, batch: &StringMap) -> Result<StringMap, BackendError> {
    let mut object = match parse_payload(raw) {
        ParseOutcome::Parsed(Value::Object(map)) => map,
        ParseOutcome::Parsed(other) => {
            return Err(BackendError::Malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
        ParseOutcome::Malformed(_) => {
            return Err(BackendError::Malformed("response is not valid JSON".into()))
        }
    };

    if !batch.contains_key("translations") && object.len() == 1 {
        if let Some(Value::Object(inner)) = object.remove("translations") {
            object = inner;
        }
    }

    let out: StringMap = object
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            _ => None,
        })
        .collect();

    if out.is_empty() && !batch.is_empty() {
        return Err(BackendError::Malformed("empty or invalid response".into()));
    }

    Ok(out)
}

/// `{"translated": "..."}`, with a fallback for output that is not strictly valid JSON.
pub fn parse_single(raw: &str) -> Result<String, BackendError> {
    let text = match parse_payload(raw) {
        ParseOutcome::Parsed(v) => match v.get("translated").and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => extract_translated_field(strip_fence(raw)).ok_or_else(|| {
                BackendError::Malformed("response has no \"translated\" field".into())
            })?,
        },
        ParseOutcome::Malformed(body) => extract_translated_field(&body).ok_or_else(|| {
            BackendError::Malformed("failed to parse or extract translation response".into())
        })?,
    };

    if text.trim().is_empty() {
        return Err(BackendError::Malformed("empty translation".into()));
    }
    Ok(text)
}

/// Secondary parser: pull the `translated` string out of near-JSON text.
pub fn extract_translated_field(body: &str) -> Option<String> {
    let caps = TRANSLATED_FIELD_RE.captures(body)?;
    let inner = caps.get(1)?.as_str();
    Some(unescape(inner))
}

/// Undo JSON-style escaping of control characters, quotes and backslashes.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            _ => {
                out.push('\\');
                continue;
            }
        }
        chars.next();
    }

    out
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
