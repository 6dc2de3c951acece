//! Placeholder replacement in template text.

use crate::State;

/// Replace every placeholder token in `template` with its resolved value.
///
/// Tokens are matched left to right in a single pass, preferring the longest
/// key at each position, so values inserted into the output are never
/// scanned again. A key ending in an identifier character only matches when
/// the next character is not one (`$ip` does not match inside `$ip2`), and a
/// key starting with one only matches when the previous character is not one
/// (`HOST` does not match inside `LOCALHOST`).
pub fn replace_tokens(template: &str, values: &[State]) -> String {
    let mut ordered: Vec<&State> = values.iter().filter(|s| !s.key.is_empty()).collect();
    // Stable: for duplicate keys the first resolved value wins.
    ordered.sort_by(|a, b| b.key.len().cmp(&a.key.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    'scan: while !rest.is_empty() {
        let before = template[..template.len() - rest.len()].chars().next_back();
        for state in &ordered {
            if let Some(after) = rest.strip_prefix(state.key.as_str()) {
                if !extends_token(&state.key, before, after) {
                    out.push_str(&state.value);
                    rest = after;
                    continue 'scan;
                }
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }

    out
}

/// Whether a match of `key` would only be part of a longer identifier.
fn extends_token(key: &str, before: Option<char>, after: &str) -> bool {
    let joins_left = key.chars().next().is_some_and(is_token_char)
        && before.is_some_and(is_token_char);
    let joins_right = key.chars().next_back().is_some_and(is_token_char)
        && after.chars().next().is_some_and(is_token_char);
    joins_left || joins_right
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
