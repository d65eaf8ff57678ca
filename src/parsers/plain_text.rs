use crate::model::StringMap;

/// Key under which a plain-text file's whole content is tracked.
pub const TEXT_KEY: &str = "content";

pub fn parse(text: &str) -> StringMap {
    let mut entries = StringMap::new();
    entries.insert(TEXT_KEY, text.trim_start_matches('\u{feff}'));
    entries
}

/// New text if one was produced, else whatever was there before.
pub fn render(updates: &StringMap, prior: Option<&StringMap>) -> Option<String> {
    updates
        .get(TEXT_KEY)
        .or_else(|| prior.and_then(|p| p.get(TEXT_KEY)))
        .map(str::to_string)
}
