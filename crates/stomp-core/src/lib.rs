//! Protocol core for a STOMP client: session state machine, command
//! constructors, failover scheduling, and the transport seam.
//!
//! This crate knows *what is legal* — which commands a session may issue in
//! its current state, which headers a version requires, how a failover URI
//! schedules reconnect attempts — but never touches a socket. Pair it with
//! `stomp-proto` for wire encoding/decoding and an external transport
//! implementing [`transport::BlockingTransport`] or [`transport::EventTransport`]
//! to drive it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod env;
pub mod error;
pub mod failover;
pub mod session;
pub mod transport;

pub use env::{Environment, SystemEnvironment};
pub use error::{ConnectionError, ProtocolError};
pub use failover::{FailoverBroker, FailoverProtocol, FailoverUri, FailoverUriError, ReconnectPolicy};
pub use session::{Session, SessionState, SubscriptionRef, SubscriptionToken, TransactionRef};
pub use transport::{BlockingTransport, DisconnectReason, EventTransport};
