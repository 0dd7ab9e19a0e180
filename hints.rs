use crate::catalog::{FoodCatalog, KeywordEntry};
use crate::models::DishLabel;
use std::path::Path;

/// Lower-cased file name without directory or extension.
pub fn normalized_stem(filename: &str) -> String {
    let path = Path::new(filename);
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_lowercase()
}

/// Returns the dish of the first keyword found in `filename`, checking the
/// curated table before the general override table. Matching is plain
/// substring search in table order, so an earlier, shorter keyword shadows
/// a later, more specific one.
pub fn hint(catalog: &FoodCatalog, filename: &str) -> Option<DishLabel> {
    let stem = normalized_stem(filename);
    if stem.is_empty() {
        return None;
    }
    if let Some(entry) = first_match(&catalog.custom_keywords, &stem) {
        log::debug!("Curated keyword '{}' in '{}' -> {}", entry.keyword, stem, entry.dish);
        return Some(entry.dish.clone());
    }
    if let Some(entry) = first_match(&catalog.keyword_overrides, &stem) {
        log::debug!("Override keyword '{}' in '{}' -> {}", entry.keyword, stem, entry.dish);
        return Some(entry.dish.clone());
    }
    None
}

fn first_match<'a>(table: &'a [KeywordEntry], stem: &str) -> Option<&'a KeywordEntry> {
    table
        .iter()
        .find(|entry| !entry.keyword.is_empty() && stem.contains(entry.keyword.as_str()))
}

/// Case-insensitive check for any of `tokens` in `filename`.
pub fn contains_any(filename: &str, tokens: &[String]) -> bool {
    let name = filename.to_lowercase();
    tokens.iter().any(|t| !t.is_empty() && name.contains(t.as_str()))
}
