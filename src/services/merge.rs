use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::ResourceError;
use crate::model::ResourceFormat;
use crate::parsers::{self, nested_json, php_array};
use crate::services::files;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MergeReport {
    pub merged: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Overlay `translated_dir/<lang>/<file_name>` onto `locales_dir/<lang>/<file_name>`
/// for every language directory under `locales_dir`.
///
/// Locale keys missing from the translated file are kept. A locale file is only
/// rewritten when the overlay changes it.
pub fn merge_locales(
    locales_dir: &Path,
    translated_dir: &Path,
    file_name: &str,
    format: ResourceFormat,
) -> Result<MergeReport, ResourceError> {
    if format == ResourceFormat::PlainText {
        return Err(ResourceError::Unsupported(
            "merging is only defined for keyed-array and nested-object files".into(),
        ));
    }

    let mut languages: Vec<PathBuf> = fs::read_dir(locales_dir)
        .map_err(|e| ResourceError::io(locales_dir, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    languages.sort();

    let mut report = MergeReport::default();

    for lang_dir in languages {
        let Some(lang) = lang_dir.file_name() else {
            continue;
        };
        let locale_file = lang_dir.join(file_name);
        let translated_file = translated_dir.join(lang).join(file_name);

        if !locale_file.is_file() {
            warn!("skipped (no original): {}", locale_file.display());
            report.skipped.push(locale_file);
            continue;
        }
        if !translated_file.is_file() {
            report.skipped.push(locale_file);
            continue;
        }

        if merge_file(&locale_file, &translated_file, format)? {
            info!("merged: {}", locale_file.display());
            report.merged.push(locale_file);
        } else {
            info!("no changes: {}", locale_file.display());
            report.unchanged.push(locale_file);
        }
    }

    Ok(report)
}

fn merge_file(locale: &Path, translated: &Path, format: ResourceFormat) -> Result<bool, ResourceError> {
    let base = parsers::load(locale, format)?;
    let overlay = parsers::load(translated, format)?;

    let rendered = match format {
        ResourceFormat::KeyedArray => {
            let mut merged = base.entries.clone();
            for (key, value) in overlay.entries.iter() {
                merged.insert(key, value);
            }
            if merged == base.entries {
                return Ok(false);
            }
            php_array::render(&merged)
        }
        _ => {
            let (Some(base_tree), Some(overlay_tree)) = (base.tree.as_ref(), overlay.tree.as_ref()) else {
                return Ok(false);
            };
            let mut merged = base_tree.clone();
            nested_json::apply_updates(&mut merged, overlay_tree, &overlay.entries);
            if &merged == base_tree {
                return Ok(false);
            }
            nested_json::render(&merged)?
        }
    };

    files::write_atomic(locale, rendered.as_bytes())?;
    Ok(true)
}
