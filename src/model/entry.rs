use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Translate,
    Keep,
}

/// Per-key decision, computed once when the file is loaded.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationRecord {
    pub key: String,

    pub source_text: String,

    #[serde(default)]
    pub existing_translation: Option<String>,

    pub decision: Decision,

    /// Existing/source length ratio in percent, when both are present and the source is non-empty.
    #[serde(default)]
    pub ratio: Option<f64>,
}

impl TranslationRecord {
    pub fn needs_translation(&self) -> bool {
        self.decision == Decision::Translate
    }
}
