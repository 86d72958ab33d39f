//! STOMP wire format: frames, escaping, and the incremental parser.
//!
//! This crate is the bottom of the stack: it knows how to turn a [`Frame`]
//! into bytes and how to turn an arbitrarily chunked byte stream back into
//! frames and heart-beats. It does not know anything about sessions,
//! subscriptions, or connections — see `stomp-core` for that.
//!
//! Everything here is synchronous and allocation-only; there is no I/O.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod escape;
pub mod frame;
pub mod parser;
pub mod spec;

pub use errors::{EncodingError, FrameError};
pub use frame::{Frame, HeartBeat, Item};
pub use parser::Parser;
