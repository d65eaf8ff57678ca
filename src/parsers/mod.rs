pub mod nested_json;
pub mod php_array;
pub mod plain_text;

use std::path::Path;

use crate::error::ResourceError;
use crate::model::{ResourceFile, ResourceFormat, StringMap};
use crate::services::files;

pub fn load(path: &Path, format: ResourceFormat) -> Result<ResourceFile, ResourceError> {
    let text = files::read_text(path)?;
    parse(path, format, &text)
}

pub fn parse(path: &Path, format: ResourceFormat, text: &str) -> Result<ResourceFile, ResourceError> {
    let (entries, tree) = match format {
        ResourceFormat::KeyedArray => (php_array::parse(text)?, None),
        ResourceFormat::NestedObject => {
            let (tree, entries) = nested_json::parse(text)?;
            (entries, Some(tree))
        }
        ResourceFormat::PlainText => (plain_text::parse(text), None),
    };

    Ok(ResourceFile {
        path: path.to_path_buf(),
        format,
        entries,
        tree,
    })
}

/// Serialise the merged output for `source`.
///
/// The previously saved output (if any) is the base; only keys present in `updates`
/// are overwritten, and keys that disappeared from the source are carried through.
/// `None` means there is nothing worth writing.
pub fn render(
    source: &ResourceFile,
    prior: Option<&ResourceFile>,
    updates: &StringMap,
) -> Result<Option<String>, ResourceError> {
    match source.format {
        ResourceFormat::KeyedArray => {
            let mut merged = prior.map(|p| p.entries.clone()).unwrap_or_default();
            for key in source.entries.keys() {
                if let Some(value) = updates.get(key) {
                    merged.insert(key, value);
                }
            }
            Ok(Some(php_array::render(&merged)))
        }
        ResourceFormat::NestedObject => {
            let empty = serde_json::Value::Object(serde_json::Map::new());
            let source_tree = source.tree.as_ref().unwrap_or(&empty);

            let merged = match prior.and_then(|p| p.tree.as_ref()) {
                Some(tree) if tree.is_object() || tree.is_array() => {
                    let mut base = tree.clone();
                    nested_json::apply_updates(&mut base, source_tree, updates);
                    base
                }
                _ => nested_json::translated_copy(source_tree, updates),
            };
            Ok(Some(nested_json::render(&merged)?))
        }
        ResourceFormat::PlainText => Ok(plain_text::render(updates, prior.map(|p| &p.entries))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn php(text: &str) -> ResourceFile {
        parse(Path::new("messages.php"), ResourceFormat::KeyedArray, text).unwrap()
    }

    fn json_file(value: serde_json::Value) -> ResourceFile {
        parse(
            Path::new("messages.json"),
            ResourceFormat::NestedObject,
            &value.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn keyed_array_merge_keeps_prior_and_stale_keys() {
        let source = php("<?php return ['k' => 'Hello', 'new' => 'Fresh', 'failed' => 'Nope'];");
        let prior = php("<?php return ['stale' => 'Старе', 'k' => 'y'];");
        let updates: StringMap = [("k", "z"), ("new", "Свіже")].into_iter().collect();

        let text = render(&source, Some(&prior), &updates).unwrap().unwrap();
        let merged = php_array::parse(&text).unwrap();

        let pairs: Vec<(&str, &str)> = merged.iter().collect();
        assert_eq!(pairs, vec![("stale", "Старе"), ("k", "z"), ("new", "Свіже")]);
    }

    #[test]
    fn keyed_array_omitted_key_keeps_prior_value() {
        let source = php("<?php return ['k' => 'Hello'];");
        let prior = php("<?php return ['k' => 'y'];");

        let text = render(&source, Some(&prior), &StringMap::new()).unwrap().unwrap();
        assert_eq!(php_array::parse(&text).unwrap().get("k"), Some("y"));
    }

    #[test]
    fn nested_merge_without_prior_never_writes_source_text() {
        let source = json_file(json!({"a": {"title": "Title", "max": 3}, "b": "Body"}));
        let updates: StringMap = [("a.title", "Заголовок")].into_iter().collect();

        let text = render(&source, None, &updates).unwrap().unwrap();
        let out: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(out, json!({"a": {"title": "Заголовок", "max": 3}}));
        assert!(text.find("Заголовок").unwrap() < text.find("\"max\"").unwrap());
    }

    #[test]
    fn nested_merge_overlays_prior_output() {
        let source = json_file(json!({"a": "A", "b": "B"}));
        let prior = json_file(json!({"a": "старе", "b": "Б", "gone": "лишилось"}));
        let updates: StringMap = [("a", "нове")].into_iter().collect();

        let text = render(&source, Some(&prior), &updates).unwrap().unwrap();
        let out: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(out, json!({"a": "нове", "b": "Б", "gone": "лишилось"}));
    }
}
