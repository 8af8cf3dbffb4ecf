//! Request preparation for the scoring endpoint.
//!
//! Control characters (U+0000 through U+001F) are stripped from the captured
//! text. Everything else, including quotes and backslashes, is left alone and
//! escaped by the JSON encoder when the request body is serialized.

use crate::types::{AnalysisRequest, CapturedText};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // C0 control range, newline and tab included
    static ref CONTROL_CHARS: Regex = Regex::new(r"[\x00-\x1F]").unwrap();
}

/// Remove every character in U+0000..=U+001F
pub fn sanitize(text: &str) -> String {
    CONTROL_CHARS.replace_all(text, "").into_owned()
}

/// Sanitize captured text and wrap it in a request payload
pub fn prepare_request(captured: &CapturedText) -> AnalysisRequest {
    AnalysisRequest {
        text: sanitize(captured.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_strips_newlines_and_tabs() {
        assert_eq!(sanitize("line one\nline two\tend\r"), "line oneline twoend");
    }

    #[test]
    fn test_clean_text_unchanged() {
        assert_eq!(sanitize("I love this"), "I love this");
    }

    #[test]
    fn test_keeps_quotes_and_multibyte() {
        let input = "She said \"ñandú\" \\ 😀 — ok";
        assert_eq!(sanitize(input), input);
    }

    #[test]
    fn test_keeps_delete_and_c1_controls() {
        // Only the C0 range is stripped
        assert_eq!(sanitize("a\u{7F}b\u{85}c"), "a\u{7F}b\u{85}c");
    }

    #[test]
    fn test_request_body_escapes_reserved_characters() {
        let captured = CapturedText::new("quote \" and \\ backslash\nnext");
        let request = prepare_request(&captured);
        let body = serde_json::to_string(&request).unwrap();

        assert_eq!(body, r#"{"text":"quote \" and \\ backslashnext"}"#);
        let parsed: AnalysisRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.text, "quote \" and \\ backslashnext");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(s in any::<String>()) {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn prop_strips_exactly_c0_controls(s in any::<String>()) {
            let expected: String = s.chars().filter(|c| !('\u{0}'..='\u{1F}').contains(c)).collect();
            let cleaned = sanitize(&s);
            prop_assert!(cleaned.chars().all(|c| c as u32 > 0x1F));
            prop_assert_eq!(cleaned, expected);
        }
    }
}
