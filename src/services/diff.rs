use tracing::debug;

use crate::model::{Decision, StringMap, TranslationRecord};

/// Existing translations shorter than this share of the source are treated as stubs.
pub const RETRANSLATE_RATIO_PERCENT: f64 = 40.0;

/// Classify every source key as `translate` or `keep`.
///
/// A key is kept when an existing translation is present and at least
/// [`RETRANSLATE_RATIO_PERCENT`] of the source length. Empty sources are always kept
/// once a translation exists.
pub fn decide(source: &StringMap, existing: Option<&StringMap>) -> Vec<TranslationRecord> {
    source
        .iter()
        .map(|(key, text)| decide_one(key, text, existing.and_then(|e| e.get(key))))
        .collect()
}

pub fn decide_one(key: &str, source: &str, existing: Option<&str>) -> TranslationRecord {
    let (decision, ratio) = match existing {
        None => (Decision::Translate, None),
        Some(e) => {
            let source_len = source.chars().count();
            if source_len == 0 {
                (Decision::Keep, None)
            } else {
                let ratio = e.chars().count() as f64 / source_len as f64 * 100.0;
                if ratio < RETRANSLATE_RATIO_PERCENT {
                    (Decision::Translate, Some(ratio))
                } else {
                    (Decision::Keep, Some(ratio))
                }
            }
        }
    };

    match (decision, ratio) {
        (Decision::Translate, None) => debug!("translating new string: {key}"),
        (Decision::Translate, Some(r)) => debug!("retranslating string: {key} (length ratio: {r:.2}%)"),
        (Decision::Keep, Some(r)) => debug!("keeping existing translation: {key} (length ratio: {r:.2}%)"),
        (Decision::Keep, None) => debug!("keeping existing translation: {key} (empty source)"),
    }

    TranslationRecord {
        key: key.to_string(),
        source_text: source.to_string(),
        existing_translation: existing.map(str::to_string),
        decision,
        ratio,
    }
}

/// Keys marked `translate`, in source order.
pub fn pending(records: &[TranslationRecord]) -> StringMap {
    records
        .iter()
        .filter(|r| r.needs_translation())
        .map(|r| (r.key.clone(), r.source_text.clone()))
        .collect()
}
