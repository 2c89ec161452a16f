//! Default collection and display names for types
//!
//! Type names are singular camel case (`userGroup`). When a declaration
//! leaves out the plural or the display name they are derived here.

/// Plural collection name for a singular type name
///
/// Only the last word is inflected: `category` → `categories`,
/// `dataSet` → `dataSets`, `address` → `addresses`.
pub fn pluralize(singular: &str) -> String {
    if singular.is_empty() {
        return String::new();
    }

    let ends_with = |suffix: &str| singular.ends_with(suffix);
    let stem = |n: usize| &singular[..singular.len() - n];

    if ends_with("y") && singular.len() > 1 && !preceded_by_vowel(singular, 1) {
        return format!("{}ies", stem(1));
    }
    if ["s", "sh", "ch", "x", "z"].iter().any(|s| singular.ends_with(*s)) {
        return format!("{}es", singular);
    }
    if ends_with("fe") && singular.len() > 2 {
        return format!("{}ves", stem(2));
    }
    if ends_with("f") && !ends_with("ff") && singular.len() > 1 {
        return format!("{}ves", stem(1));
    }
    format!("{}s", singular)
}

/// Display name for a type name: `userGroup` → `UserGroup`
pub fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn preceded_by_vowel(word: &str, suffix_len: usize) -> bool {
    word[..word.len() - suffix_len]
        .chars()
        .last()
        .is_some_and(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
}
