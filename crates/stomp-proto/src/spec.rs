//! STOMP protocol constants and the per-version registry.
//!
//! Names every command and header used by versions 1.0, 1.1, and 1.2, and
//! the per-version character codec / escape exemption that [`crate::frame`]
//! and [`crate::escape`] consult.

use crate::errors::{EncodingError, FrameError};

/// STOMP protocol version 1.0.
pub const VERSION_1_0: &str = "1.0";
/// STOMP protocol version 1.1.
pub const VERSION_1_1: &str = "1.1";
/// STOMP protocol version 1.2.
pub const VERSION_1_2: &str = "1.2";

/// All versions this crate understands, in ascending order.
pub const VERSIONS: [&str; 3] = [VERSION_1_0, VERSION_1_1, VERSION_1_2];

/// Version negotiated when a caller does not specify one.
pub const DEFAULT_VERSION: &str = VERSION_1_0;

/// Commands a client may send.
pub const CONNECT: &str = "CONNECT";
/// Alias for `CONNECT` introduced in 1.1.
pub const STOMP: &str = "STOMP";
/// Sent by the server in reply to `CONNECT`/`STOMP`.
pub const CONNECTED: &str = "CONNECTED";
/// Graceful session teardown.
pub const DISCONNECT: &str = "DISCONNECT";
/// Publish a message to a destination.
pub const SEND: &str = "SEND";
/// Register interest in a destination.
pub const SUBSCRIBE: &str = "SUBSCRIBE";
/// Cancel a subscription.
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
/// Acknowledge a delivered message.
pub const ACK: &str = "ACK";
/// Negatively acknowledge a delivered message (1.1+).
pub const NACK: &str = "NACK";
/// Start a transaction.
pub const BEGIN: &str = "BEGIN";
/// Commit a transaction.
pub const COMMIT: &str = "COMMIT";
/// Roll back a transaction.
pub const ABORT: &str = "ABORT";
/// A message delivered to a subscription.
pub const MESSAGE: &str = "MESSAGE";
/// Server acknowledgment of a `receipt` header.
pub const RECEIPT: &str = "RECEIPT";
/// Server-reported fatal error; terminates the session.
pub const ERROR: &str = "ERROR";

/// Header carrying a subscription's destination.
pub const DESTINATION_HEADER: &str = "destination";
/// Header carrying a client-assigned subscription identifier.
pub const ID_HEADER: &str = "id";
/// Header on `MESSAGE` naming the subscription it was delivered to.
pub const SUBSCRIPTION_HEADER: &str = "subscription";
/// Header identifying a message for `ACK`/`NACK` (1.0/1.1).
pub const MESSAGE_ID_HEADER: &str = "message-id";
/// Header carrying the session identifier assigned by the server.
pub const SESSION_HEADER: &str = "session";
/// Header carrying the server's self-identification string.
pub const SERVER_HEADER: &str = "server";
/// Header carrying the negotiated protocol version.
pub const VERSION_HEADER: &str = "version";
/// Header listing versions a client is willing to speak.
pub const ACCEPT_VERSION_HEADER: &str = "accept-version";
/// Header naming the virtual host a client wants to connect to.
pub const HOST_HEADER: &str = "host";
/// Header naming the transaction a `SEND`/`ACK`/`NACK`/`COMMIT`/`ABORT` belongs to.
pub const TRANSACTION_HEADER: &str = "transaction";
/// Header requesting a `RECEIPT` reply.
pub const RECEIPT_HEADER: &str = "receipt";
/// Header on `RECEIPT` echoing the requested receipt id.
pub const RECEIPT_ID_HEADER: &str = "receipt-id";
/// Header giving the exact byte length of the frame body.
pub const CONTENT_LENGTH_HEADER: &str = "content-length";
/// Header naming the MIME type of the frame body.
pub const CONTENT_TYPE_HEADER: &str = "content-type";
/// Header carrying heart-beat negotiation values (`cx,cy`).
pub const HEART_BEAT_HEADER: &str = "heart-beat";
/// Header carrying login credentials on `CONNECT`.
pub const LOGIN_HEADER: &str = "login";
/// Header carrying a passcode on `CONNECT`.
pub const PASSCODE_HEADER: &str = "passcode";

/// Line delimiter used to terminate the command and each header line.
pub const LINE_DELIMITER: u8 = b'\n';
/// Carriage return accepted (but never emitted) before a line delimiter in 1.2.
pub const CARRIAGE_RETURN: u8 = b'\r';
/// Byte terminating every frame.
pub const FRAME_DELIMITER: u8 = 0x00;
/// Separator between a header key and its value.
pub const HEADER_SEPARATOR: u8 = b':';

/// Validates and normalizes a caller-supplied version string.
///
/// `None` resolves to [`DEFAULT_VERSION`].
///
/// # Errors
///
/// Returns [`FrameError::UnsupportedVersion`] if `version` is `Some` and not
/// one of [`VERSIONS`].
pub fn version(version: Option<&str>) -> Result<&'static str, FrameError> {
    let version = version.unwrap_or(DEFAULT_VERSION);
    VERSIONS
        .iter()
        .find(|&&v| v == version)
        .copied()
        .ok_or_else(|| FrameError::UnsupportedVersion(version.to_string()))
}

/// Picks the highest mutually supported version from a client's candidate
/// list, as a server reply to `accept-version` would.
///
/// # Errors
///
/// Returns [`FrameError::UnsupportedVersion`] if no candidate is supported.
pub fn highest_supported<'a>(candidates: &[&'a str]) -> Result<&'a str, FrameError> {
    VERSIONS
        .iter()
        .rev()
        .find_map(|supported| candidates.iter().find(|c| *c == supported).copied())
        .ok_or_else(|| FrameError::UnsupportedVersion(candidates.join(",")))
}

/// Encodes `text` under the character codec mandated for `version`.
///
/// Version 1.0 is ASCII-only; 1.1 and 1.2 are UTF-8 (and so never fail,
/// since Rust `str` is always valid UTF-8 already).
///
/// # Errors
///
/// Returns [`EncodingError::UnrepresentableText`] if `version` is 1.0 and
/// `text` contains a non-ASCII byte.
pub fn encode(version: &str, text: &str) -> Result<Vec<u8>, EncodingError> {
    if version == VERSION_1_0 && !text.is_ascii() {
        return Err(EncodingError::UnrepresentableText {
            version: version.to_string(),
            text: text.to_string(),
        });
    }
    Ok(text.as_bytes().to_vec())
}

/// Whether `command`'s headers are exempt from the escape rules in `version`.
///
/// The STOMP 1.0 interop convention keeps `CONNECT`/`CONNECTED` header
/// values literal; 1.1 and 1.2 always escape.
#[must_use]
pub fn escape_exempt(version: &str, command: &str) -> bool {
    version == VERSION_1_0 && (command == CONNECT || command == CONNECTED)
}
