//! Tolerant decoding of catalog responses.
//!
//! The catalog does not always emit valid JSON: strings may be wrapped in
//! single quotes, object keys may be bare identifiers, and double-quoted
//! strings may contain `\'`. [`normalize`] rewrites those constructs into
//! strict JSON, after which [`decode`] parses with `serde_json`.

use serde::Deserialize;
use serde_json::Value;

use super::types::RawCatalogItem;
use super::CatalogError;

/// Name of the top-level array holding the results.
const ITEMS_FIELD: &str = "item";

/// Decode a catalog response into its raw items, in catalog order.
///
/// A missing (or non-array) `item` field means "no results" and yields an
/// empty list. Any item that cannot be decoded fails the whole response.
pub fn decode(raw: &str) -> Result<Vec<RawCatalogItem>, CatalogError> {
    let normalized = normalize(raw);

    let root: Value = serde_json::from_str(&normalized)
        .map_err(|e| CatalogError::ParseError(format!("Invalid catalog response: {}", e)))?;

    let items = match root.get(ITEMS_FIELD) {
        Some(Value::Array(items)) => items,
        _ => return Ok(Vec::new()),
    };

    items
        .iter()
        .enumerate()
        .map(|(index, value)| decode_item(index, value))
        .collect()
}

fn decode_item(index: usize, value: &Value) -> Result<RawCatalogItem, CatalogError> {
    if !value.is_object() {
        return Err(CatalogError::ParseError(format!(
            "Item {} is not an object",
            index
        )));
    }

    let item = RawCatalogItem::deserialize(value)
        .map_err(|e| CatalogError::ParseError(format!("Item {}: {}", index, e)))?;

    if item.resolved_isbn().is_none() {
        return Err(CatalogError::ParseError(format!(
            "Item {} has neither isbn13 nor isbn",
            index
        )));
    }

    Ok(item)
}

/// Rewrite lenient JSON into strict JSON.
///
/// - `'single quoted'` strings become double-quoted, escaping inner `"`.
/// - Bare identifiers followed by `:` become quoted keys.
/// - `\'` inside any string becomes a plain `'`.
/// - Raw control characters inside strings are escaped.
/// - Trailing `;` after the document (JS-style output) is dropped.
///
/// Input that is already strict JSON passes through unchanged.
pub fn normalize(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches(';').trim_end();
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_part(chars[i]) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                if next_non_whitespace(&chars, i) == Some(':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    // true / false / null, or garbage the parser will reject
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Copy the string literal starting at `start` as a double-quoted JSON
/// string. Returns the index just past the closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    out.push('"');

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => match chars.get(i + 1) {
                Some('\'') => {
                    out.push('\'');
                    i += 2;
                }
                Some(&next) => {
                    out.push('\\');
                    out.push(next);
                    i += 2;
                }
                None => {
                    out.push_str("\\\\");
                    i += 1;
                }
            },
            c if c == quote => {
                out.push('"');
                return i + 1;
            }
            '"' => {
                // only reachable inside a single-quoted string
                out.push_str("\\\"");
                i += 1;
            }
            '\n' => {
                out.push_str("\\n");
                i += 1;
            }
            '\r' => {
                out.push_str("\\r");
                i += 1;
            }
            '\t' => {
                out.push_str("\\t");
                i += 1;
            }
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    // Unterminated: leave it open so the strict parser reports it.
    i
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

fn next_non_whitespace(chars: &[char], from: usize) -> Option<char> {
    chars[from..].iter().copied().find(|c| !c.is_whitespace())
}
