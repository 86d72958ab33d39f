//! Transport contracts.
//!
//! The core never touches a socket or an event loop; these traits are the
//! stable seam an external blocking or event-driven transport is expected
//! to implement around [`crate::session::Session`] and [`stomp_proto::Parser`].
//! No implementation lives in this crate — it is a thin shell wrapping the
//! Sans-IO core, except here even the shell is left to the caller.

use std::time::Duration;

use stomp_proto::Item;

/// What happened when a transport's connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The session asked to disconnect and the peer acknowledged it (or no
    /// receipt was requested).
    Graceful,
    /// The connection was lost without a prior `DISCONNECT`.
    Unexpected {
        /// A transport-supplied description of what went wrong.
        detail: String,
    },
    /// The peer sent a STOMP `ERROR` frame.
    PeerError {
        /// The `ERROR` frame's `info()` summary.
        detail: String,
    },
}

/// Synchronous, blocking transport contract.
///
/// Mirrors a plain blocking socket: writes block until sent, reads block up
/// to a timeout. A caller drives [`crate::session::Session`] by writing the
/// frames it returns and feeding received bytes to a [`stomp_proto::Parser`].
pub trait BlockingTransport {
    /// Transport-level error type (e.g. an I/O error).
    type Error;

    /// Sends `bytes` to the peer, blocking until the write completes.
    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Blocks until at least one byte is available, then reads into `buf`
    /// and returns the number of bytes read (0 means the peer closed the
    /// connection).
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Returns whether a read would return data within `timeout`, without
    /// consuming it.
    fn can_read(&mut self, timeout: Duration) -> Result<bool, Self::Error>;

    /// Closes the transport. Idempotent.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Event-driven transport contract.
///
/// Mirrors a callback-based reactor integration: the transport owns reading
/// bytes off the wire and feeding them through a [`stomp_proto::Parser`],
/// then calls back into the core for each complete item and on disconnect.
pub trait EventTransport {
    /// Called once per complete parsed item (a frame or a heart-beat).
    fn on_item(&mut self, item: Item);

    /// Called when the connection ends, for any reason.
    fn on_disconnect(&mut self, reason: DisconnectReason);
}
