//! # claw-proto
//!
//! Wire protocol spoken between a client and the gateway.
//!
//! Every WebSocket text message carries one JSON [`Frame`]: a request, a
//! response correlated to a request by id, or an unsolicited event. The
//! first exchange on every connection is the `connect` handshake described
//! in [`handshake`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod close;
pub mod error;
pub mod frames;
pub mod handshake;

pub use close::LinkCloseCode;
pub use error::ProtoError;
pub use frames::{ACCEPTED_STATUS, ErrorShape, EventFrame, Frame, RequestFrame, ResponseFrame};
pub use handshake::{
    AuthParams, CHALLENGE_EVENT, CONNECT_METHOD, ClientInfo, ConnectChallenge, ConnectParams,
    Features, HelloOk, PROTOCOL_VERSION, Policy, ServerInfo, SessionDefaults, Snapshot,
    TICK_EVENT,
};
