//! The incremental STOMP parser.
//!
//! Bytes arrive in arbitrary chunks; [`Parser`] buffers them and yields
//! complete [`Item`]s (frames or heart-beats) as they become available. It
//! never blocks and never performs I/O: the caller feeds bytes with
//! [`Parser::add`] and drains items with [`Parser::get`].

use crate::{
    errors::FrameError,
    frame::{Frame, HeartBeat, Item},
    spec::{CARRIAGE_RETURN, FRAME_DELIMITER, LINE_DELIMITER, VERSION_1_2},
};

/// Internal state of the line-oriented state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing has been read for the next item yet. A leading LF here is a
    /// heart-beat.
    Idle,
    /// Reading the command line.
    Command,
    /// Between the command and the first header, or between two headers.
    HeaderStart,
    /// Reading one `key:value` header line.
    HeaderLine,
    /// Reading the body. `content_length` is `Some(n)` if a
    /// `content-length` header fixed the body size.
    Body { content_length: Option<usize> },
    /// A malformed byte was observed; the parser will not produce further
    /// items until [`Parser::reset`].
    Failed,
}

/// Default ceiling on a single frame's body size, absent an explicit limit.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Byte-fed STOMP frame/heart-beat parser.
///
/// One `Parser` belongs to one connection's inbound byte stream and is not
/// safe for concurrent use: feeding bytes and draining items must be
/// serialized by the caller.
#[derive(Debug, Clone)]
pub struct Parser {
    version: String,
    max_frame_size: usize,
    state: State,
    buf: Vec<u8>,
    command: String,
    raw_headers: Vec<(String, String)>,
}

impl Parser {
    /// Builds a parser for `version`, with the default frame size limit.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self::with_max_frame_size(version, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Builds a parser for `version` with a caller-chosen frame size limit.
    #[must_use]
    pub fn with_max_frame_size(version: impl Into<String>, max_frame_size: usize) -> Self {
        Self {
            version: version.into(),
            max_frame_size,
            state: State::Idle,
            buf: Vec::new(),
            command: String::new(),
            raw_headers: Vec::new(),
        }
    }

    /// Updates the version used to decode subsequent frames, e.g. after a
    /// reconnect renegotiates a different version. Takes effect at the next
    /// frame boundary; bytes already buffered mid-frame are unaffected.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Appends bytes received from the peer to the parse buffer.
    pub fn add(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Whether a complete item is currently available without adding more
    /// bytes.
    #[must_use]
    pub fn can_read(&self) -> bool {
        self.clone().get().is_ok_and(|item| item.is_some())
    }

    /// Resets the parser to start a fresh item, discarding any
    /// partially-parsed state and unconsumed buffered bytes. Used to
    /// recover after a [`FrameError`] or to restart after a reconnect.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = State::Idle;
        self.command.clear();
        self.raw_headers.clear();
    }

    /// Returns the next complete item, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] on malformed input. Once an error is
    /// returned, the parser is in a failed state and yields the same error
    /// until [`Parser::reset`] is called.
    pub fn get(&mut self) -> Result<Option<Item>, FrameError> {
        loop {
            match self.state {
                State::Failed => {
                    return Err(FrameError::MalformedHeader(
                        "parser is in a failed state".to_string(),
                    ));
                },
                State::Idle => {
                    let Some(&byte) = self.buf.first() else { return Ok(None) };
                    if byte == LINE_DELIMITER {
                        self.buf.remove(0);
                        return Ok(Some(Item::HeartBeat(HeartBeat::new(self.version.clone()))));
                    }
                    self.state = State::Command;
                },
                State::Command => {
                    let Some(line) = self.take_line()? else { return Ok(None) };
                    if line.is_empty() {
                        self.state = State::Failed;
                        return Err(FrameError::MissingCommand);
                    }
                    self.command = line;
                    self.raw_headers.clear();
                    self.state = State::HeaderStart;
                },
                State::HeaderStart => {
                    let Some(&byte) = self.buf.first() else { return Ok(None) };
                    if byte == LINE_DELIMITER {
                        self.buf.remove(0);
                        let content_length = self.content_length()?;
                        self.state = State::Body { content_length };
                    } else {
                        self.state = State::HeaderLine;
                    }
                },
                State::HeaderLine => {
                    let Some(line) = self.take_line()? else { return Ok(None) };
                    let Some(sep) = line.find(':') else {
                        self.state = State::Failed;
                        return Err(FrameError::MalformedHeader(line));
                    };
                    let key_raw = &line[..sep];
                    let value_raw = &line[sep + 1..];
                    let key =
                        crate::escape::unescape(&self.version, &self.command, key_raw, "header key")?;
                    let value = crate::escape::unescape(
                        &self.version,
                        &self.command,
                        value_raw,
                        "header value",
                    )?;
                    self.raw_headers.push((key, value));
                    self.state = State::HeaderStart;
                },
                State::Body { content_length } => match content_length {
                    Some(len) => {
                        if self.buf.len() < len + 1 {
                            return Ok(None);
                        }
                        if self.buf[len] != FRAME_DELIMITER {
                            self.state = State::Failed;
                            return Err(FrameError::MalformedHeader(
                                "content-length body not terminated by NUL".to_string(),
                            ));
                        }
                        let body = self.buf[..len].to_vec();
                        self.buf.drain(..=len);
                        return Ok(Some(self.finish_frame(body)));
                    },
                    None => {
                        let Some(nul_pos) = self.buf.iter().position(|&b| b == FRAME_DELIMITER)
                        else {
                            if self.buf.len() > self.max_frame_size {
                                self.state = State::Failed;
                                return Err(FrameError::TooLarge { limit: self.max_frame_size });
                            }
                            return Ok(None);
                        };
                        let body = self.buf[..nul_pos].to_vec();
                        self.buf.drain(..=nul_pos);
                        return Ok(Some(self.finish_frame(body)));
                    },
                },
            }
        }
    }

    fn finish_frame(&mut self, body: Vec<u8>) -> Item {
        let command = std::mem::take(&mut self.command);
        let raw_headers = std::mem::take(&mut self.raw_headers);
        self.state = State::Idle;
        Item::Frame(Frame::with_raw_headers(command, raw_headers, body, self.version.clone()))
    }

    /// Pulls one line (up to, not including, the delimiter) out of the
    /// front of the buffer, if a complete line is present. In version 1.2,
    /// a trailing CR is stripped.
    fn take_line(&mut self) -> Result<Option<String>, FrameError> {
        let Some(lf_pos) = self.buf.iter().position(|&b| b == LINE_DELIMITER) else {
            return Ok(None);
        };
        let mut end = lf_pos;
        if self.version == VERSION_1_2 && end > 0 && self.buf[end - 1] == CARRIAGE_RETURN {
            end -= 1;
        }
        let line = String::from_utf8(self.buf[..end].to_vec()).map_err(|_| FrameError::InvalidUtf8)?;
        self.buf.drain(..=lf_pos);
        Ok(Some(line))
    }

    fn content_length(&self) -> Result<Option<usize>, FrameError> {
        let Some((_, value)) =
            self.raw_headers.iter().find(|(k, _)| k == crate::spec::CONTENT_LENGTH_HEADER)
        else {
            return Ok(None);
        };
        value
            .parse::<usize>()
            .map(Some)
            .map_err(|_| FrameError::InvalidContentLength(value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::VERSION_1_0;

    fn parse_all(bytes: &[u8], version: &str) -> Vec<Item> {
        let mut parser = Parser::new(version);
        parser.add(bytes);
        let mut items = Vec::new();
        while let Some(item) = parser.get().unwrap() {
            items.push(item);
        }
        items
    }

    #[test]
    fn parses_send_example() {
        let wire = b"SEND\ndestination:/queue/world\n\ntwo\nlines\x00";
        let items = parse_all(wire, VERSION_1_0);
        assert_eq!(items.len(), 1);
        let Item::Frame(frame) = &items[0] else { panic!("expected frame") };
        assert_eq!(frame.command, "SEND");
        assert_eq!(frame.header("destination"), Some("/queue/world"));
        assert_eq!(frame.body, b"two\nlines");
    }

    #[test]
    fn leading_lf_is_a_heart_beat() {
        let items = parse_all(b"\n", VERSION_1_0);
        assert_eq!(items, vec![Item::HeartBeat(HeartBeat::new(VERSION_1_0))]);
    }

    #[test]
    fn chunking_is_independent_of_partition() {
        let wire = b"SEND\ndestination:/queue/world\n\ntwo\nlines\x00".to_vec();
        let whole = parse_all(&wire, VERSION_1_0);

        for split in 1..wire.len() {
            let mut parser = Parser::new(VERSION_1_0);
            parser.add(&wire[..split]);
            assert_eq!(parser.get().unwrap(), None);
            parser.add(&wire[split..]);
            let item = parser.get().unwrap();
            assert_eq!(item, Some(whole[0].clone()), "split at {split} produced a different frame");
        }
    }

    #[test]
    fn content_length_allows_embedded_nul() {
        let body = b"a\x00b";
        let mut wire = b"SEND\ncontent-length:3\n\n".to_vec();
        wire.extend_from_slice(body);
        wire.push(0);
        let items = parse_all(&wire, VERSION_1_0);
        let Item::Frame(frame) = &items[0] else { panic!("expected frame") };
        assert_eq!(frame.body, body);
    }

    #[test]
    fn duplicate_headers_preserved_in_raw_form() {
        let wire = b"SEND\nfoo:bar1\nfoo:bar2\n\nsome stuff\nand more\x00";
        let items = parse_all(wire, VERSION_1_0);
        let Item::Frame(frame) = &items[0] else { panic!("expected frame") };
        assert_eq!(
            frame.raw_headers(),
            Some(&[("foo".to_string(), "bar1".to_string()), ("foo".to_string(), "bar2".to_string())][..])
        );
        assert_eq!(frame.header("foo"), Some("bar1"));
    }

    #[test]
    fn carriage_return_accepted_before_lf_in_1_2() {
        let wire = b"SEND\r\ndestination:/queue/a\r\n\r\nbody\x00";
        let items = parse_all(wire, VERSION_1_2);
        let Item::Frame(frame) = &items[0] else { panic!("expected frame") };
        assert_eq!(frame.command, "SEND");
    }

    #[test]
    fn missing_header_separator_is_an_error() {
        let mut parser = Parser::new(VERSION_1_0);
        parser.add(b"SEND\nbadheader\n\nbody\x00");
        assert!(parser.get().is_err());
    }

    #[test]
    fn reset_recovers_from_a_failed_state() {
        let mut parser = Parser::new(VERSION_1_0);
        parser.add(b"SEND\nbadheader\n\nbody\x00");
        assert!(parser.get().is_err());
        assert!(parser.get().is_err());
        parser.reset();
        parser.add(b"SEND\ndestination:/q\n\nbody\x00");
        assert!(parser.get().unwrap().is_some());
    }
}
