//! Per-version header key/value escaping.
//!
//! STOMP 1.1 introduced backslash escapes for header keys and values so
//! that `:` and line delimiters can appear inside them; 1.2 added one more
//! for carriage return. Version 1.0 has no escape mechanism at all: the
//! forbidden characters simply must not occur.

use crate::{
    errors::{EncodingError, FrameError},
    spec::{VERSION_1_0, VERSION_1_1, VERSION_1_2, escape_exempt},
};

/// Escapes `text` for emission as a header key or value under `version`,
/// for `command`.
///
/// Returns the text unchanged for `escape_exempt` commands (`CONNECT`/
/// `CONNECTED` under 1.0) and for version 1.0 in general, since 1.0 defines
/// no escapes. Callers are responsible for rejecting forbidden characters
/// via [`validate_1_0`] in that case.
#[must_use]
pub fn escape(version: &str, command: &str, text: &str) -> String {
    if version == VERSION_1_0 || escape_exempt(version, command) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            '\r' if version == VERSION_1_2 => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Reverses [`escape`]: turns wire-level escaped text back into the literal
/// header key or value.
///
/// # Errors
///
/// Returns [`FrameError::UnknownEscape`] if a backslash is followed by a
/// character with no defined meaning under `version`.
pub fn unescape(
    version: &str,
    command: &str,
    text: &str,
    context: &'static str,
) -> Result<String, FrameError> {
    if version == VERSION_1_0 || escape_exempt(version, command) {
        return Ok(text.to_string());
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some('c') => out.push(':'),
            Some('r') if version == VERSION_1_2 => out.push('\r'),
            Some(escape) => {
                return Err(FrameError::UnknownEscape { context, escape });
            },
            None => {
                return Err(FrameError::UnknownEscape { context, escape: '\0' });
            },
        }
    }
    Ok(out)
}

/// Validates that `text` contains none of the characters that STOMP 1.0
/// cannot represent in a header (it defines no escape mechanism).
///
/// # Errors
///
/// Returns [`EncodingError::ForbiddenCharacter`] if `text` contains `:`,
/// `\n`, or `\r`.
pub fn validate_1_0(context: &'static str, text: &str) -> Result<(), EncodingError> {
    if text.contains([':', '\n', '\r']) {
        return Err(EncodingError::ForbiddenCharacter { context, value: text.to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::DISCONNECT;

    #[test]
    fn escape_1_1_matches_spec_scenario() {
        let key = escape(VERSION_1_1, DISCONNECT, "\n\\");
        let value = escape(VERSION_1_1, DISCONNECT, ":\t\n");
        assert_eq!(key, "\\n\\\\");
        assert_eq!(value, "\\c\t\\n");
    }

    #[test]
    fn escape_1_2_adds_carriage_return() {
        let value = escape(VERSION_1_2, DISCONNECT, ":\t\r");
        assert_eq!(value, "\\c\t\\r");
    }

    #[test]
    fn escape_1_0_is_identity() {
        assert_eq!(escape(VERSION_1_0, "SEND", "plain"), "plain");
    }

    #[test]
    fn connect_is_exempt_in_1_0_only() {
        assert_eq!(escape(VERSION_1_0, "CONNECT", "a:b"), "a:b");
        assert_eq!(escape(VERSION_1_1, "CONNECT", "a:b"), "a\\cb");
    }

    #[test]
    fn unescape_is_involution() {
        for version in [VERSION_1_1, VERSION_1_2] {
            let original = "a:b\\c\nd";
            let escaped = escape(version, "SEND", original);
            let restored = unescape(version, "SEND", &escaped, "value").unwrap();
            assert_eq!(restored, original);
        }
    }

    #[test]
    fn unknown_escape_sequence_is_rejected() {
        let err = unescape(VERSION_1_1, "SEND", "\\q", "value").unwrap_err();
        assert!(matches!(err, FrameError::UnknownEscape { escape: 'q', .. }));
    }

    #[test]
    fn validate_1_0_rejects_colon_and_newline() {
        assert!(validate_1_0("value", "plain").is_ok());
        assert!(validate_1_0("value", "a:b").is_err());
        assert!(validate_1_0("value", "a\nb").is_err());
    }
}
