//! Dictionary substitution for serialized STAC documents.
//!
//! Common field names are replaced by two-character tokens (`\u{1}` plus a
//! letter). Serialized JSON escapes control characters, so the token lead
//! byte never occurs in the input and the substitution is reversible.

use crate::error::{Error, Result};
use std::borrow::Cow;

/// Prefix identifying a substituted payload
pub const MARKER: &str = "~d1~";

const TOKEN_LEAD: char = '\u{1}';

/// Field names in token order; entry `i` is encoded as `TOKEN_LEAD` + `TOKEN_LETTERS[i]`
const DICTIONARY: &[&str] = &[
    "\"stac_extensions\":",
    "\"stac_version\":",
    "\"description\":",
    "\"coordinates\":",
    "\"properties\":",
    "\"collection\":",
    "\"providers\":",
    "\"summaries\":",
    "\"temporal\":",
    "\"interval\":",
    "\"geometry\":",
    "\"keywords\":",
    "\"features\":",
    "\"datetime\":",
    "\"license\":",
    "\"spatial\":",
    "\"extent\":",
    "\"assets\":",
    "\"title\":",
    "\"links\":",
    "\"roles\":",
    "\"type\":",
    "\"href\":",
    "\"bbox\":",
    "\"rel\":",
    "\"id\":",
];

const TOKEN_LETTERS: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

fn token(index: usize) -> String {
    let mut token = String::with_capacity(2);
    token.push(TOKEN_LEAD);
    token.push(TOKEN_LETTERS[index] as char);
    token
}

/// Substitute dictionary words, returning the marked result only when it is
/// strictly smaller than `input`
pub fn compress(input: &str) -> Option<String> {
    if input.contains(TOKEN_LEAD) || input.starts_with(MARKER) {
        return None;
    }

    let mut order: Vec<usize> = (0..DICTIONARY.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(DICTIONARY[i].len()));

    let mut body = input.to_string();
    for i in order {
        if body.contains(DICTIONARY[i]) {
            body = body.replace(DICTIONARY[i], &token(i));
        }
    }

    let compressed = format!("{}{}", MARKER, body);
    (compressed.len() < input.len()).then_some(compressed)
}

/// Reverse [`compress`]; unmarked input is returned unchanged
pub fn decompress(input: &str) -> Result<Cow<'_, str>> {
    let Some(body) = input.strip_prefix(MARKER) else {
        return Ok(Cow::Borrowed(input));
    };

    let mut out = String::with_capacity(body.len() * 2);
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != TOKEN_LEAD {
            out.push(c);
            continue;
        }
        let word = chars
            .next()
            .and_then(|letter| TOKEN_LETTERS.iter().position(|&l| l as char == letter))
            .and_then(|index| DICTIONARY.get(index))
            .ok_or_else(|| Error::Serialization("invalid dictionary token".into()))?;
        out.push_str(word);
    }
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_stac_document_shrinks() {
        let doc = json!({
            "type": "Collection",
            "id": "sentinel-2-l2a",
            "stac_version": "1.0.0",
            "description": "Sentinel-2 Level-2A",
            "links": [{"rel": "self", "href": "https://stac.example/collections/sentinel-2-l2a", "type": "application/json"}],
            "extent": {"spatial": {"bbox": [[-180, -90, 180, 90]]}, "temporal": {"interval": [["2015-06-27T10:25:31Z", null]]}},
            "license": "proprietary"
        })
        .to_string();

        let compressed = compress(&doc).unwrap();
        assert!(compressed.starts_with(MARKER));
        assert!(compressed.len() < doc.len());
        assert_eq!(decompress(&compressed).unwrap(), doc);
    }

    #[test]
    fn test_no_gain_is_rejected() {
        assert_eq!(compress(r#"{"a":1}"#), None);
        assert_eq!(compress(""), None);
    }

    #[test]
    fn test_unmarked_passthrough() {
        let raw = r#"{"data":1}"#;
        assert!(matches!(decompress(raw).unwrap(), Cow::Borrowed(s) if s == raw));
    }

    #[test]
    fn test_invalid_token() {
        let bad = format!("{}{}", MARKER, '\u{1}');
        assert!(decompress(&bad).is_err());
        let bad = format!("{}\u{1}Z", MARKER);
        assert!(decompress(&bad).is_err());
    }

    proptest! {
        #[test]
        fn prop_reversible(words in proptest::collection::vec(
            prop_oneof![
                Just("\"id\":".to_string()),
                Just("\"type\":".to_string()),
                Just("\"links\":".to_string()),
                Just("\"href\":".to_string()),
                "[a-z0-9 ,:{}\\[\\]\"]{0,12}",
            ],
            0..40,
        )) {
            let input = words.concat();
            if let Some(compressed) = compress(&input) {
                prop_assert!(compressed.len() < input.len());
                prop_assert_eq!(decompress(&compressed).unwrap(), input);
            }
        }
    }
}
