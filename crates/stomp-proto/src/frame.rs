//! The in-memory [`Frame`] and [`HeartBeat`] types, and their wire encoding.
//!
//! A `Frame` is a pure data holder (command + headers + body). Decoding is
//! owned by [`crate::parser::Parser`]; this module only knows how to go the
//! other way, from a `Frame` to wire bytes.

use std::collections::HashMap;

use crate::{
    errors::EncodingError,
    escape,
    spec::{self, FRAME_DELIMITER, LINE_DELIMITER},
};

/// Either a complete frame or a bare heart-beat, as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A complete STOMP frame.
    Frame(Frame),
    /// A heart-beat line.
    HeartBeat(HeartBeat),
}

/// A STOMP frame: command, headers, and an opaque body.
///
/// # Invariants
///
/// - `command` is non-empty.
/// - Headers are encoded per [`version`](Frame::version)'s character codec
///   at wire time; `body` is written through unchanged.
///
/// Equality compares `command`, `headers`, and `body` only — `version` is
/// not part of a frame's identity, since the same logical frame may be
/// re-encoded under a renegotiated version after reconnect.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The STOMP command, e.g. `SEND`.
    pub command: String,
    /// Opaque message body. Not subject to character encoding.
    pub body: Vec<u8>,
    /// Protocol version this frame is encoded under.
    pub version: String,
    headers: Vec<(String, String)>,
    raw: bool,
}

impl Frame {
    /// Builds a frame with unique-keyed headers (first occurrence wins if
    /// `headers` contains duplicate keys).
    pub fn new<K, V, H>(
        command: impl Into<String>,
        headers: H,
        body: impl Into<Vec<u8>>,
        version: impl Into<String>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        H: IntoIterator<Item = (K, V)>,
    {
        let mut seen = HashMap::new();
        let mut deduped = Vec::new();
        for (k, v) in headers {
            let k = k.into();
            if seen.insert(k.clone(), ()).is_none() {
                deduped.push((k, v.into()));
            }
        }
        Self { command: command.into(), headers: deduped, body: body.into(), version: version.into(), raw: false }
    }

    /// Builds a frame that preserves duplicate header keys in insertion
    /// order, as a peer may legally send them on the wire.
    ///
    /// Equality and encoding treat the header list as an ordered multi-map
    /// until [`Frame::unraw`] collapses it.
    pub fn with_raw_headers(
        command: impl Into<String>,
        raw_headers: Vec<(String, String)>,
        body: impl Into<Vec<u8>>,
        version: impl Into<String>,
    ) -> Self {
        Self { command: command.into(), headers: raw_headers, body: body.into(), version: version.into(), raw: true }
    }

    /// The first value associated with `key`, if any.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Headers as they will appear on the wire: every pair in insertion
    /// order, including duplicates if this frame was built with
    /// [`Frame::with_raw_headers`] and not yet [`Frame::unraw`]'d.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The raw ordered header list, with duplicates, if this frame is still
    /// in raw mode (built via [`Frame::with_raw_headers`] and not yet
    /// unraw'd).
    #[must_use]
    pub fn raw_headers(&self) -> Option<&[(String, String)]> {
        self.raw.then_some(self.headers.as_slice())
    }

    /// Collapses duplicate header keys, keeping the first occurrence,
    /// switching this frame from multi-map identity to unique-map identity.
    pub fn unraw(&mut self) {
        if !self.raw {
            return;
        }
        let mut seen = HashMap::new();
        self.headers.retain(|(k, _)| seen.insert(k.clone(), ()).is_none());
        self.raw = false;
    }

    /// Encodes this frame to STOMP wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] if `command` or a header key/value cannot
    /// be represented under this frame's version (non-ASCII text under
    /// 1.0, or a forbidden character with no 1.0 escape).
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        let mut out = spec::encode(&self.version, &self.command)?;
        out.push(LINE_DELIMITER);

        // A body containing a NUL is only legal on the wire alongside an
        // explicit content-length; if the caller didn't set one, add it so
        // the body round-trips rather than getting truncated at the first
        // embedded NUL.
        let needs_content_length = self.header(spec::CONTENT_LENGTH_HEADER).is_none()
            && self.body.contains(&FRAME_DELIMITER);

        for (key, value) in &self.headers {
            let (key, value) = if spec::escape_exempt(&self.version, &self.command) {
                if self.version == spec::VERSION_1_0 {
                    escape::validate_1_0("header key", key)?;
                    escape::validate_1_0("header value", value)?;
                }
                (key.clone(), value.clone())
            } else {
                let escaped_key = escape::escape(&self.version, &self.command, key);
                let escaped_value = escape::escape(&self.version, &self.command, value);
                if self.version == spec::VERSION_1_0 {
                    escape::validate_1_0("header key", &escaped_key)?;
                    escape::validate_1_0("header value", &escaped_value)?;
                }
                (escaped_key, escaped_value)
            };
            out.extend(spec::encode(&self.version, &key)?);
            out.push(spec::HEADER_SEPARATOR);
            out.extend(spec::encode(&self.version, &value)?);
            out.push(LINE_DELIMITER);
        }

        if needs_content_length {
            out.extend(spec::encode(&self.version, spec::CONTENT_LENGTH_HEADER)?);
            out.push(spec::HEADER_SEPARATOR);
            out.extend(self.body.len().to_string().into_bytes());
            out.push(LINE_DELIMITER);
        }

        out.push(LINE_DELIMITER);
        out.extend_from_slice(&self.body);
        out.push(FRAME_DELIMITER);
        Ok(out)
    }

    /// A short, log-friendly summary: command, headers, and the first 20
    /// bytes of the body (with an ellipsis if truncated).
    #[must_use]
    pub fn info(&self) -> String {
        const INFO_LENGTH: usize = 20;

        let mut parts = Vec::new();
        if !self.headers.is_empty() {
            parts.push(format!("headers={:?}", self.headers));
        }
        if !self.body.is_empty() {
            let truncated = self.body.len() > INFO_LENGTH;
            let shown = &self.body[..self.body.len().min(INFO_LENGTH)];
            let text = String::from_utf8_lossy(shown);
            parts.push(if truncated {
                format!("body={text:?}...")
            } else {
                format!("body={text:?}")
            });
        }
        parts.push(format!("version={}", self.version));
        format!("{} frame [{}]", self.command, parts.join(", "))
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        if self.command != other.command || self.body != other.body {
            return false;
        }
        if self.raw || other.raw {
            return self.headers == other.headers;
        }
        let lhs: HashMap<&str, &str> = self.headers().collect();
        let rhs: HashMap<&str, &str> = other.headers().collect();
        lhs == rhs
    }
}

impl Eq for Frame {}

/// A STOMP heart-beat: a bare line delimiter sent as a keep-alive outside
/// any frame. Equal to any other heart-beat regardless of version.
#[derive(Debug, Clone)]
pub struct HeartBeat {
    /// Protocol version this heart-beat was observed or will be emitted
    /// under. CRLF is only ever emitted in 1.2; other versions use a bare
    /// LF.
    pub version: String,
}

impl HeartBeat {
    /// Builds a heart-beat for the given version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self { version: version.into() }
    }

    /// Wire form: a single line delimiter.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        vec![LINE_DELIMITER]
    }

    /// Log-friendly summary.
    #[must_use]
    pub fn info(&self) -> &'static str {
        "heart-beat"
    }
}

impl PartialEq for HeartBeat {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for HeartBeat {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{DESTINATION_HEADER, DISCONNECT, SEND, VERSION_1_0, VERSION_1_1, VERSION_1_2};

    #[test]
    fn send_example_matches_scenario_1() {
        let frame = Frame::new(
            SEND,
            [(DESTINATION_HEADER, "/queue/world")],
            b"two\nlines".to_vec(),
            VERSION_1_0,
        );
        assert_eq!(frame.encode().unwrap(), b"SEND\ndestination:/queue/world\n\ntwo\nlines\x00");
    }

    #[test]
    fn escape_in_1_1_matches_scenario_2() {
        let frame =
            Frame::new(DISCONNECT, [("\n\\", ":\t\n")], Vec::new(), VERSION_1_1);
        assert_eq!(frame.encode().unwrap(), b"DISCONNECT\n\\n\\\\:\\c\t\\n\n\n\x00");
    }

    #[test]
    fn escape_in_1_2_matches_scenario_3() {
        let frame =
            Frame::new(DISCONNECT, [("\n\\", ":\t\r")], Vec::new(), VERSION_1_2);
        assert_eq!(frame.encode().unwrap(), b"DISCONNECT\n\\n\\\\:\\c\t\\r\n\n\x00");
    }

    #[test]
    fn duplicate_headers_match_scenario_4() {
        let mut frame = Frame::with_raw_headers(
            SEND,
            vec![("foo".to_string(), "bar1".to_string()), ("foo".to_string(), "bar2".to_string())],
            b"some stuff\nand more".to_vec(),
            VERSION_1_0,
        );
        assert_eq!(frame.encode().unwrap(), b"SEND\nfoo:bar1\nfoo:bar2\n\nsome stuff\nand more\x00");
        assert_eq!(frame.header("foo"), Some("bar1"));

        frame.unraw();
        assert_eq!(frame.raw_headers(), None);
        assert_eq!(frame.encode().unwrap(), b"SEND\nfoo:bar1\n\nsome stuff\nand more\x00");
    }

    #[test]
    fn equality_ignores_version() {
        let a = Frame::new(SEND, [("destination", "/q")], Vec::new(), VERSION_1_0);
        let b = Frame::new(SEND, [("destination", "/q")], Vec::new(), VERSION_1_1);
        assert_eq!(a, b);
    }

    #[test]
    fn equality_ignores_header_order_when_not_raw() {
        let a = Frame::new(SEND, [("a", "1"), ("b", "2")], Vec::new(), VERSION_1_0);
        let b = Frame::new(SEND, [("b", "2"), ("a", "1")], Vec::new(), VERSION_1_0);
        assert_eq!(a, b);
    }

    #[test]
    fn non_ascii_command_rejected_under_1_0() {
        let frame = Frame::new("SEND", [("destination", "fenêtre")], Vec::new(), VERSION_1_0);
        assert!(frame.encode().is_err());
    }

    #[test]
    fn info_truncates_body_with_ellipsis() {
        let frame = Frame::new(SEND, Vec::<(String, String)>::new(), vec![b'x'; 40], VERSION_1_0);
        let info = frame.info();
        assert!(info.contains("..."));
    }

    #[test]
    fn body_with_embedded_nul_gets_an_automatic_content_length() {
        let frame = Frame::new(SEND, Vec::<(String, String)>::new(), vec![0u8, 1, 0, 2], VERSION_1_0);
        let wire = frame.encode().unwrap();
        assert!(wire.windows(15).any(|w| w == b"content-length:"));
        // frame delimiter is the very last byte; everything up to it, minus
        // the header we just added, is still the literal body bytes.
        assert!(wire.ends_with(&[0u8, 1, 0, 2, 0]));
    }

    #[test]
    fn explicit_content_length_is_not_duplicated() {
        let frame =
            Frame::new(SEND, [("content-length", "4")], vec![0u8, 1, 0, 2], VERSION_1_0);
        let wire = frame.encode().unwrap();
        let occurrences = wire.windows(b"content-length".len()).filter(|w| *w == b"content-length").count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn heart_beats_are_always_equal() {
        assert_eq!(HeartBeat::new(VERSION_1_0), HeartBeat::new(VERSION_1_2));
    }
}
