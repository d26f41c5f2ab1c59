//! Tolerant parsing of oracle output.
//!
//! Language models wrap their JSON in Markdown fences, prepend chatter, or run out of
//! tokens halfway through a long HTML string. [`parse`] tries a fixed sequence of
//! strategies and returns the first JSON object that parses:
//!
//! 1. the whole text as-is,
//! 2. the text with Markdown code fences removed,
//! 3. the outermost balanced `{...}` span found in the text.
//!
//! `None` means "retry", never "crash".
//!
//! ```rust
//! use agencyllm::parser::parse;
//! use serde_json::json;
//!
//! assert_eq!(parse("```json\n{\"a\":1}\n```"), Some(json!({"a": 1})));
//! assert_eq!(parse("blah {\"a\":1} blah"), Some(json!({"a": 1})));
//! assert_eq!(parse("no json here"), None);
//! ```

use crate::action::RawAction;
use serde_json::Value;

/// Parse raw oracle text into a JSON object, or `None` when every strategy fails.
pub fn parse(raw: &str) -> Option<Value> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(value) = parse_object(text) {
        return Some(value);
    }

    let unfenced = strip_fences(text);
    if let Some(value) = parse_object(&unfenced) {
        return Some(value);
    }

    if let Some(value) = balanced_object(text) {
        return Some(value);
    }

    log::debug!(
        "agencyllm::parser::parse(...): no JSON object in: {}...",
        text.chars().take(100).collect::<String>()
    );
    None
}

/// Parse raw oracle text straight into an untrusted [`RawAction`].
pub fn parse_action(raw: &str) -> Option<RawAction> {
    parse(raw).as_ref().and_then(RawAction::from_value)
}

/// Recover an HTML document embedded in otherwise unparseable output.
///
/// Looks for a `<!DOCTYPE` or `<html` opening marker and the last `</html>` closing
/// marker. JSON string escapes inside the span are undone, since a truncated JSON answer
/// still carries its `\n` and `\"` sequences.
///
/// ```rust
/// use agencyllm::parser::extract_document_payload;
///
/// let raw = r#"{"action":"update_code","actionPayload":{"content":"<!DOCTYPE html>\n<html><body class=\"x\"></body></html>"#;
/// let doc = extract_document_payload(raw).unwrap();
/// assert!(doc.starts_with("<!DOCTYPE html>\n<html>"));
/// assert!(doc.contains("class=\"x\""));
/// assert!(doc.ends_with("</html>"));
/// ```
pub fn extract_document_payload(raw: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    let start = lower.find("<!doctype").or_else(|| lower.find("<html"))?;
    let end_marker = "</html>";
    let end = lower.rfind(end_marker)? + end_marker.len();
    if end <= start {
        return None;
    }
    Some(unescape_json_text(&raw[start..end]))
}

fn parse_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn strip_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Find the first `{` whose balanced span parses as an object. Braces inside string
/// literals are ignored while balancing.
fn balanced_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(bytes, start) {
            if let Some(value) = parse_object(&text[start..=end]) {
                return Some(value);
            }
        }
        search_from = start + 1;
    }

    // Unbalanced text: fall back to first `{` through last `}`.
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last > first {
        parse_object(&text[first..=last])
    } else {
        None
    }
}

fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn unescape_json_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_json_parses_directly() {
        assert_eq!(
            parse(r#"{"speaker":"kevin","action":"wait"}"#),
            Some(json!({"speaker": "kevin", "action": "wait"}))
        );
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        assert_eq!(parse("```json\n{\"a\":1}\n```"), Some(json!({"a": 1})));
        assert_eq!(parse("```\n{\"a\":2}\n```"), Some(json!({"a": 2})));
    }

    #[test]
    fn prose_around_json_is_ignored() {
        assert_eq!(parse("blah {\"a\":1} blah"), Some(json!({"a": 1})));
        assert_eq!(
            parse("Sure! Here you go:\n{\"a\":{\"b\":\"}\"}}\nHope that helps {"),
            Some(json!({"a": {"b": "}"}}))
        );
    }

    #[test]
    fn skips_leading_braces_that_do_not_parse() {
        assert_eq!(
            parse("{not json} then {\"ok\":true}"),
            Some(json!({"ok": true}))
        );
    }

    #[test]
    fn garbage_and_non_objects_yield_none() {
        assert_eq!(parse("completely unparseable"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse("[1,2,3]"), None);
        assert_eq!(parse("{\"a\":"), None);
    }

    #[test]
    fn parse_action_reads_fields() {
        let raw = parse_action("```json\n{\"speaker\":\"Ramona\",\"message\":\"hi\",\"action\":\"generate_image\",\"actionPayload\":{\"prompt\":\"brutalist poster\"}}\n```").unwrap();
        assert_eq!(raw.speaker.as_deref(), Some("Ramona"));
        assert_eq!(raw.payload.prompt.as_deref(), Some("brutalist poster"));
    }

    #[test]
    fn document_extraction_needs_both_markers() {
        assert_eq!(extract_document_payload("<html><body>"), None);
        assert_eq!(extract_document_payload("no markup"), None);
        assert_eq!(
            extract_document_payload("prefix <HTML lang=\\\"en\\\"></HTML> suffix").as_deref(),
            Some("<HTML lang=\"en\"></HTML>")
        );
    }

    #[test]
    fn unescape_handles_common_sequences() {
        assert_eq!(unescape_json_text(r#"a\nb\tc\"d\\e\/f"#), "a\nb\tc\"d\\e/f");
        assert_eq!(unescape_json_text(r"keep A"), r"keep A");
    }
}
