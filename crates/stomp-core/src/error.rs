//! Error types for the protocol core.
//!
//! Strongly-typed errors for different layers: [`ProtocolError`] for
//! semantically illegal operations given the negotiated version or session
//! state, and [`ConnectionError`] for the terminal condition of a failover
//! schedule. Malformed wire bytes are [`stomp_proto::FrameError`] /
//! [`stomp_proto::EncodingError`]; both convert into [`ProtocolError`] at the
//! boundary where `Session` consumes a parsed frame or encodes one.

use thiserror::Error;

/// Errors raised by [`crate::session::Session`] and [`crate::commands`].
///
/// These are never produced by malformed wire bytes (see
/// [`stomp_proto::FrameError`] for that) — they mean the operation itself is
/// illegal given the negotiated STOMP version or the session's current
/// state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A command was issued in a state that forbids it (e.g. `send` before
    /// `Connected`).
    #[error("cannot {operation} while session is {state:?}")]
    InvalidState {
        /// Current session state.
        state: crate::session::SessionState,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// A required header was missing for `command` under `version`.
    #[error("{command} requires a {header} header under STOMP {version}")]
    MissingHeader {
        /// The command being built or validated.
        command: &'static str,
        /// The missing header name.
        header: &'static str,
        /// The version whose rules require it.
        version: String,
    },

    /// A header was present that `version` forbids for `command`.
    #[error("{command} must not carry a {header} header under STOMP {version}")]
    ForbiddenHeader {
        /// The command being built or validated.
        command: &'static str,
        /// The forbidden header name.
        header: &'static str,
        /// The version whose rules forbid it.
        version: String,
    },

    /// `command` does not exist under `version` (e.g. `NACK` in 1.0).
    #[error("{command} does not exist under STOMP {version}")]
    UnsupportedCommand {
        /// The unsupported command.
        command: &'static str,
        /// The version lacking it.
        version: String,
    },

    /// A `MESSAGE`/unsubscribe/ack/nack referenced a token not present in
    /// the subscription table.
    #[error("unknown subscription token: {0:?}")]
    UnknownSubscription(crate::session::SubscriptionToken),

    /// `begin` was called with a transaction id already open.
    #[error("transaction already open: {0}")]
    DuplicateTransaction(String),

    /// `commit`/`abort`/`send` referenced a transaction id not currently
    /// open.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    /// `receipt` was called with an id that was never requested.
    #[error("unknown receipt id: {0}")]
    UnknownReceipt(String),

    /// The peer's `CONNECTED` frame negotiated a version the client never
    /// offered.
    #[error("server negotiated unsupported version: {0}")]
    UnsupportedVersion(String),

    /// A `CONNECTED` frame was expected but something else (or nothing)
    /// arrived, or `CONNECTED` arrived outside `Connecting`.
    #[error("unexpected frame {command} while session is {state:?}")]
    UnexpectedFrame {
        /// Current session state.
        state: crate::session::SessionState,
        /// Command of the unexpected frame.
        command: String,
    },

    /// The peer sent a STOMP `ERROR` frame; the session is no longer usable.
    #[error("received ERROR frame: {0}")]
    PeerError(String),

    /// Malformed wire bytes surfaced while the session was decoding a frame.
    #[error(transparent)]
    Frame(#[from] stomp_proto::FrameError),

    /// Text supplied by the caller could not be encoded under the
    /// negotiated version.
    #[error(transparent)]
    Encoding(#[from] stomp_proto::EncodingError),
}

/// The terminal condition of a [`crate::failover::FailoverProtocol`]
/// iterator: every permitted reconnect attempt has been exhausted.
///
/// Never produced by the core's frame/session layers; this is reported by
/// the (external) connection loop that drives the iterator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The configured attempt ceiling was reached without a successful
    /// connect.
    #[error("exhausted {attempts} reconnect attempts across {brokers} broker(s)")]
    FailoverExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Number of distinct brokers the failover URI named.
        brokers: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn frame_error_converts_into_protocol_error() {
        let err: ProtocolError = stomp_proto::FrameError::MissingCommand.into();
        assert!(matches!(err, ProtocolError::Frame(stomp_proto::FrameError::MissingCommand)));
    }

    #[test]
    fn invalid_state_reports_state_and_operation() {
        let err = ProtocolError::InvalidState { state: SessionState::Disconnected, operation: "send" };
        assert_eq!(err.to_string(), "cannot send while session is Disconnected");
    }
}
