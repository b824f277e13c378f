pub mod cache;
pub mod convert;
pub mod filter;
pub mod model;
pub mod registry;
pub mod resolver;

/// Convert lowerCamelCase / PascalCase to snake_case.
///
/// An underscore goes in front of an uppercase letter that follows a
/// lowercase letter, or that starts a new word after an acronym
/// (`URLString` -> `url_string`). Digits never start a word:
/// `address2Line` -> `address2line`.
pub fn to_snake(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let prev_lower = prev.is_lowercase();
            let acronym_end = prev.is_uppercase()
                && chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if prev_lower || acronym_end {
                result.push('_');
            }
        }
        result.extend(ch.to_lowercase());
    }
    result
}

/// Convert snake_case to lowerCamelCase.
///
/// The first segment is lowercased, every later non-empty segment gets its
/// first letter uppercased, and empty segments (`a__b`) contribute nothing.
pub fn to_camel(s: &str) -> String {
    let mut segments = s.split('_');
    let mut result = match segments.next() {
        Some(first) => first.to_lowercase(),
        None => return s.to_string(),
    };
    for segment in segments {
        let mut chars = segment.chars();
        if let Some(head) = chars.next() {
            result.extend(head.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}
