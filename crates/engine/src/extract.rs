//! Pull a JSON array out of free-form oracle text.
//!
//! Models wrap their answers in prose or code fences. The scanner tries each
//! `[` in order, tracks bracket depth while honoring string literals and
//! escapes, and accepts the first balanced candidate that parses as JSON.

use rolematch_core::AssignmentError;

/// Return the slice spanning the first balanced `[`…`]` starting at `start`.
fn balanced_from(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Find the first top-level JSON array in `text`.
///
/// Returns the raw substring; [`parse_first_array`] also decodes it.
pub fn extract_json_array(text: &str) -> Option<&str> {
    text.char_indices()
        .filter(|(_, ch)| *ch == '[')
        .filter_map(|(idx, _)| balanced_from(text, idx))
        .find(|candidate| serde_json::from_str::<serde_json::Value>(candidate).is_ok())
}

/// Extract and decode the first JSON array in `text`.
pub fn parse_first_array(text: &str) -> Result<Vec<serde_json::Value>, AssignmentError> {
    let raw = extract_json_array(text)
        .ok_or_else(|| AssignmentError::MalformedReply("no JSON array found in reply".into()))?;

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => Ok(items),
        Ok(_) => Err(AssignmentError::MalformedReply("reply is not a JSON array".into())),
        Err(e) => Err(AssignmentError::MalformedReply(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_array() {
        assert_eq!(extract_json_array("[[1,2],[3,4]]"), Some("[[1,2],[3,4]]"));
    }

    #[test]
    fn array_inside_prose_and_fences() {
        let text = "Here are the scores:\n```json\n[[90, 10], [20, 80]]\n```\nLet me know!";
        assert_eq!(extract_json_array(text), Some("[[90, 10], [20, 80]]"));
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let text = r#"[{"memberId": "m1", "text": "Great fit ] for [lead]"}]"#;
        let items = parse_first_array(text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["text"], "Great fit ] for [lead]");
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let text = r#"ok: [{"text": "she said \"[hi]\""}] done"#;
        let items = parse_first_array(text).unwrap();
        assert_eq!(items[0]["text"], r#"she said "[hi]""#);
    }

    #[test]
    fn skips_bracketed_prose_before_real_array() {
        let text = "[note] the matrix follows: [[1, 2], [3, 4]]";
        assert_eq!(extract_json_array(text), Some("[[1, 2], [3, 4]]"));
    }

    #[test]
    fn unbalanced_or_missing_array_is_malformed() {
        assert!(extract_json_array("no arrays here").is_none());
        assert!(matches!(
            parse_first_array("scores: [[1, 2"),
            Err(AssignmentError::MalformedReply(_))
        ));
    }
}
