//! Error types for the wire-format layer.
//!
//! Two kinds: [`FrameError`] for malformed bytes encountered while parsing
//! or decoding, and [`EncodingError`] for text that cannot be represented
//! under a version's character codec or escape rules while encoding.

use thiserror::Error;

/// A convenient result alias for this crate.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors produced while parsing or validating STOMP wire bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A version string outside of 1.0/1.1/1.2 was requested or encountered.
    #[error("unsupported STOMP version: {0}")]
    UnsupportedVersion(String),

    /// The command line was empty.
    #[error("frame is missing a command")]
    MissingCommand,

    /// A header line had no `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// A backslash escape sequence did not match any known escape.
    #[error("unrecognized escape sequence in {context}: \\{escape}")]
    UnknownEscape {
        /// What was being unescaped (a header key or value).
        context: &'static str,
        /// The character following the backslash.
        escape: char,
    },

    /// Header bytes were not valid UTF-8 under a 1.1/1.2 frame.
    #[error("invalid UTF-8 in header bytes")]
    InvalidUtf8,

    /// The frame exceeded a caller-configured size limit before a
    /// terminating NUL was observed.
    #[error("frame exceeded maximum size of {limit} bytes")]
    TooLarge {
        /// The configured limit that was exceeded.
        limit: usize,
    },

    /// `content-length` named a value that did not parse as an integer.
    #[error("invalid content-length header: {0:?}")]
    InvalidContentLength(String),
}

/// Errors produced while encoding a [`crate::Frame`] to bytes.
///
/// Kept distinct from [`FrameError`] because encoding failures are a
/// property of the caller's input, not of bytes received from a peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Text could not be represented under a version's character codec.
    #[error("cannot encode text as {version}: {text:?}")]
    UnrepresentableText {
        /// The version whose codec rejected the text.
        version: String,
        /// The text that could not be encoded.
        text: String,
    },

    /// A header key or value contained a character forbidden under 1.0
    /// (`:` or a line delimiter), which that version has no escape for.
    #[error("header {context} contains a character forbidden under STOMP 1.0: {value:?}")]
    ForbiddenCharacter {
        /// Whether the offending text was a header key or value.
        context: &'static str,
        /// The offending text.
        value: String,
    },
}

