//! Translation quality checks and glossary handling.
//!
//! Validation is a pure scoring function over a source/translation pair. Errors
//! mark meaning loss (dropped or invented placeholders); warnings mark drift
//! (suspicious length, identical text, tag count).

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ResourceError;
use crate::services::files;

const ERROR_PENALTY: i64 = 30;
const WARNING_PENALTY: i64 = 10;
const MIN_RATIO: f64 = 0.5;
const MAX_RATIO: f64 = 2.0;

static PLACEHOLDER_RES: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r":\w+").unwrap(),
        Regex::new(r"\{\w+\}").unwrap(),
        Regex::new(r"%s|%d|%\w+").unwrap(),
        Regex::new(r"\$\w+").unwrap(),
    ]
});

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"</?[\w\s="/.':;#-]+>"#).unwrap());

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    pub score: u8,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// Translation/original length ratio, rounded to two decimals.
    pub ratio: f64,
}

/// Validates against English as the source language.
pub fn validate_translation(original: &str, translated: &str, language: &str) -> ValidationResult {
    validate_translation_with_source(original, translated, language, "en")
}

pub fn validate_translation_with_source(
    original: &str,
    translated: &str,
    language: &str,
    source_language: &str,
) -> ValidationResult {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    if translated.trim().is_empty() {
        errors.push("Translation is empty".to_string());
        return ValidationResult {
            valid: false,
            score: 0,
            warnings,
            errors,
            ratio: 0.0,
        };
    }

    if original == translated && !language.eq_ignore_ascii_case(source_language) {
        warnings.push("Translation identical to original".to_string());
    }

    let original_len = original.chars().count();
    let ratio = if original_len == 0 {
        0.0
    } else {
        translated.chars().count() as f64 / original_len as f64
    };
    if original_len > 0 {
        let percent = (ratio * 100.0).round();
        if ratio < MIN_RATIO {
            warnings.push(format!("Translation too short ({percent}% of original)"));
        } else if ratio > MAX_RATIO {
            warnings.push(format!("Translation too long ({percent}% of original)"));
        }
    }

    let original_ph = extract_placeholders(original);
    let translated_ph = extract_placeholders(translated);

    for p in &original_ph {
        if !translated_ph.contains(p) {
            errors.push(format!("Missing placeholder: {p}"));
        }
    }
    for p in &translated_ph {
        if !original_ph.contains(p) {
            errors.push(format!("Extra placeholder: {p}"));
        }
    }

    let original_tags = extract_html_tags(original).len();
    let translated_tags = extract_html_tags(translated).len();
    if original_tags != translated_tags {
        warnings.push(format!(
            "HTML tag count mismatch (original: {original_tags}, translated: {translated_tags})"
        ));
    }

    let penalty = ERROR_PENALTY * errors.len() as i64 + WARNING_PENALTY * warnings.len() as i64;
    let score = (100 - penalty).max(0) as u8;

    ValidationResult {
        valid: errors.is_empty(),
        score,
        warnings,
        errors,
        ratio: (ratio * 100.0).round() / 100.0,
    }
}

/// Placeholder tokens in first-seen order, without duplicates.
///
/// Recognised: `:name`, `{name}`, `%s`/`%d`/`%name`, `$name`.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for re in PLACEHOLDER_RES.iter() {
        for m in re.find_iter(text) {
            if !out.iter().any(|p| p == m.as_str()) {
                out.push(m.as_str().to_string());
            }
        }
    }
    out
}

pub fn extract_html_tags(text: &str) -> Vec<&str> {
    HTML_TAG_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Terms kept verbatim and terms with mandated translations.
///
/// ```json
/// { "preserve": ["Cursor Style"], "force": { "cursor": { "uk": "курсор" } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Glossary {
    #[serde(default)]
    pub preserve: Vec<String>,

    #[serde(default)]
    pub force: BTreeMap<String, BTreeMap<String, String>>,
}

impl Glossary {
    pub fn load(path: &Path) -> Result<Self, ResourceError> {
        let text = files::read_text(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn is_empty(&self) -> bool {
        self.preserve.is_empty() && self.force.is_empty()
    }

    /// Replace forced terms (whole word, case-insensitive) for `language`.
    pub fn apply(&self, text: &str, language: &str) -> String {
        let mut out = text.to_string();

        for (term, by_lang) in &self.force {
            let replacement = by_lang.get(language).or_else(|| {
                by_lang
                    .iter()
                    .find(|(l, _)| l.eq_ignore_ascii_case(language))
                    .map(|(_, r)| r)
            });
            let Some(replacement) = replacement else {
                continue;
            };

            let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
            match Regex::new(&pattern) {
                Ok(re) => out = re.replace_all(&out, NoExpand(replacement)).into_owned(),
                Err(e) => warn!("skipping glossary term {term:?}: {e}"),
            }
        }

        out
    }
}
