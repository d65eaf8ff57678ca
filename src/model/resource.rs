use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::string_map::StringMap;

/// Native shape of a resource file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceFormat {
    /// `<?php return ['key' => 'value', ...];`
    #[serde(alias = "php")]
    KeyedArray,

    /// Arbitrary-depth JSON object with string leaves.
    #[serde(alias = "json")]
    NestedObject,

    /// Whole file is one translation unit.
    #[serde(alias = "files", alias = "text")]
    PlainText,
}

impl ResourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceFormat::KeyedArray => "keyed-array",
            ResourceFormat::NestedObject => "nested-object",
            ResourceFormat::PlainText => "plain-text",
        }
    }

    /// Whether a discovered input file belongs to this format.
    pub fn accepts(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match self {
            ResourceFormat::KeyedArray => ext.as_deref() == Some("php"),
            ResourceFormat::NestedObject => ext.as_deref() == Some("json"),
            ResourceFormat::PlainText => true,
        }
    }
}

impl fmt::Display for ResourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "php" | "keyed-array" => Ok(ResourceFormat::KeyedArray),
            "json" | "nested-object" => Ok(ResourceFormat::NestedObject),
            "files" | "text" | "plain-text" => Ok(ResourceFormat::PlainText),
            other => Err(format!(
                "unknown file type '{other}' (expected one of: php, json, files)"
            )),
        }
    }
}

/// A loaded resource: flat dotted-key view plus whatever the format needs to re-render.
#[derive(Debug, Clone)]
pub struct ResourceFile {
    pub path: PathBuf,
    pub format: ResourceFormat,
    pub entries: StringMap,

    /// Parsed document for nested-object files; `None` for the other formats.
    pub tree: Option<Value>,
}
