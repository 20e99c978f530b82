//! Completion cleanup: strip markdown code fences before JSON parsing.

use crate::error::{self, Result};
use serde::de::DeserializeOwned;

const FENCE: &str = "```";

/// Strip one leading fence (bare or language-tagged) and one trailing fence,
/// trimming whitespace around the residue. Never fails.
///
/// ```
/// use fireglobe_core::sanitize::sanitize_json_response;
///
/// assert_eq!(sanitize_json_response("```json\n[1, 2]\n```"), "[1, 2]");
/// assert_eq!(sanitize_json_response("  {\"a\": 1} "), "{\"a\": 1}");
/// ```
pub fn sanitize_json_response(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }

    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }

    text.trim().to_string()
}

/// Sanitize, then deserialize. Failures are `ParseFailed`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = sanitize_json_response(raw);
    serde_json::from_str(&cleaned)
        .map_err(|e| error::json_parse("completion", e).with_operation("sanitize::parse_json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::Value;

    #[test]
    fn test_strips_tagged_fence() {
        assert_eq!(sanitize_json_response("```json\n{\"score\": 80}\n```"), "{\"score\": 80}");
        assert_eq!(sanitize_json_response("```JSON\n[]\n```\n"), "[]");
    }

    #[test]
    fn test_strips_bare_fence() {
        assert_eq!(sanitize_json_response("```\n[1]\n```"), "[1]");
        assert_eq!(sanitize_json_response("```[1]```"), "[1]");
    }

    #[test]
    fn test_unfenced_text_is_only_trimmed() {
        assert_eq!(sanitize_json_response("\n  [1, 2]  \n"), "[1, 2]");
        assert_eq!(sanitize_json_response("not json"), "not json");
    }

    #[test]
    fn test_single_sided_fences() {
        assert_eq!(sanitize_json_response("```json\n{}"), "{}");
        assert_eq!(sanitize_json_response("{}\n```"), "{}");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "```json\n[{\"name\": \"A\"}]\n```",
            "```\n{}\n```",
            "  [1, 2, 3]  ",
            "```json\n{\"a\": 1}",
            "plain text answer",
            "",
            "```",
        ];
        for input in inputs {
            let once = sanitize_json_response(input);
            assert_eq!(sanitize_json_response(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_parse_json_success_and_failure() {
        let value: Value = parse_json("```json\n{\"ok\": true}\n```").unwrap();
        assert_eq!(value["ok"], true);

        let err = parse_json::<Value>("Sorry, I cannot help with that.").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
    }
}
