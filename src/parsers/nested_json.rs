use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ResourceError;
use crate::model::StringMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Location of one string leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPath {
    pub dotted: String,
    pub segments: Vec<Segment>,
}

pub fn parse(text: &str) -> Result<(Value, StringMap), ResourceError> {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return Err(ResourceError::Unsupported(
            "document root must be a JSON object or array".into(),
        ));
    }

    let tree: Value = serde_json::from_str(trimmed)?;
    let entries = flatten(&tree);
    Ok((tree, entries))
}

pub fn render(tree: &Value) -> Result<String, ResourceError> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// String leaves in traversal order, keyed by `.`-joined path.
pub fn flatten(tree: &Value) -> StringMap {
    let mut out = StringMap::new();
    walk(tree, &mut Vec::new(), &mut |segments: &[Segment], text: &str| {
        out.insert(join(segments), text);
    });
    out
}

pub fn leaf_paths(tree: &Value) -> Vec<LeafPath> {
    let mut out = Vec::new();
    walk(tree, &mut Vec::new(), &mut |segments: &[Segment], _: &str| {
        out.push(LeafPath {
            dotted: join(segments),
            segments: segments.to_vec(),
        });
    });
    out
}

fn walk(value: &Value, stack: &mut Vec<Segment>, visit: &mut dyn FnMut(&[Segment], &str)) {
    match value {
        Value::String(s) => visit(stack, s),
        Value::Object(map) => {
            for (k, v) in map {
                stack.push(Segment::Key(k.clone()));
                walk(v, stack, visit);
                stack.pop();
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                stack.push(Segment::Index(i));
                walk(v, stack, visit);
                stack.pop();
            }
        }
        _ => {}
    }
}

fn join(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| match s {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Segments for a dotted key that has no known leaf path.
pub fn split_dotted(key: &str) -> Vec<Segment> {
    key.split('.').map(|s| Segment::Key(s.to_string())).collect()
}

/// Write `value` at `segments`, creating intermediate objects.
///
/// Returns `false` when the path runs into a non-container value or an
/// out-of-range array index; the tree is left unchanged in that case.
pub fn set_path(root: &mut Value, segments: &[Segment], value: String) -> bool {
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return false,
    };

    let mut current = root;
    for seg in parents {
        current = match (current, seg) {
            (Value::Object(map), Segment::Key(k)) => map
                .entry(k.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            (Value::Object(map), Segment::Index(i)) => map
                .entry(i.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            (Value::Array(items), seg) => match array_index(seg) {
                Some(i) if i < items.len() => &mut items[i],
                _ => return false,
            },
            _ => return false,
        };
        if !matches!(current, Value::Object(_) | Value::Array(_)) {
            if current.is_null() {
                *current = Value::Object(Map::new());
            } else {
                return false;
            }
        }
    }

    match (current, last) {
        (Value::Object(map), Segment::Key(k)) => {
            map.insert(k.clone(), Value::String(value));
            true
        }
        (Value::Object(map), Segment::Index(i)) => {
            map.insert(i.to_string(), Value::String(value));
            true
        }
        (Value::Array(items), seg) => match array_index(seg) {
            Some(i) if i < items.len() => {
                items[i] = Value::String(value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

fn array_index(seg: &Segment) -> Option<usize> {
    match seg {
        Segment::Index(i) => Some(*i),
        Segment::Key(k) => k.parse().ok(),
    }
}

/// The source document with each string leaf replaced by its translation.
///
/// Members are kept in source order. String members without a translation are
/// dropped (as are objects left empty by that), untranslated array elements become
/// `null` so indices stay stable. Non-string leaves survive as they are.
pub fn translated_copy(source: &Value, updates: &StringMap) -> Value {
    match fill(source, updates, &mut Vec::new()) {
        Some(v) => v,
        None => match source {
            Value::Array(_) => Value::Array(Vec::new()),
            _ => Value::Object(Map::new()),
        },
    }
}

fn fill(value: &Value, updates: &StringMap, stack: &mut Vec<Segment>) -> Option<Value> {
    match value {
        Value::String(_) => updates
            .get(&join(stack))
            .map(|t| Value::String(t.to_string())),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                stack.push(Segment::Key(k.clone()));
                let filled = fill(v, updates, stack);
                stack.pop();
                if let Some(filled) = filled {
                    out.insert(k.clone(), filled);
                }
            }
            if out.is_empty() && !map.is_empty() {
                None
            } else {
                Some(Value::Object(out))
            }
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, v) in items.iter().enumerate() {
                stack.push(Segment::Index(i));
                out.push(fill(v, updates, stack).unwrap_or(Value::Null));
                stack.pop();
            }
            Some(Value::Array(out))
        }
        other => Some(other.clone()),
    }
}

/// Apply `updates` onto `base` using the leaf locations of `source`.
pub fn apply_updates(base: &mut Value, source: &Value, updates: &StringMap) {
    let paths: HashMap<String, Vec<Segment>> = leaf_paths(source)
        .into_iter()
        .map(|p| (p.dotted, p.segments))
        .collect();

    for (key, value) in updates.iter() {
        let segments = paths.get(key).cloned().unwrap_or_else(|| split_dotted(key));
        if !set_path(base, &segments, value.to_string()) {
            warn!("cannot place translation for '{key}': output structure conflicts with source");
        }
    }
}
