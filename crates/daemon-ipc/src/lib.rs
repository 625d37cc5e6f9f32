//! Socket transport between the daemon and its clients.
//!
//! Carries the `ipc-protocol-types` protocol over a Unix domain socket:
//! request/response calls plus NDJSON streaming subscriptions for
//! supervised-process output. Re-exports the wire types so consumers only
//! depend on this crate.

mod error;
mod server;

pub use error::{IpcError, IpcResult};
pub use ipc_protocol_types::{
    error_codes, Method, OutputStream, ProcessOutputRecord, RawOutputRecord, Request, Response,
};
pub use server::{
    IpcClient, IpcServer, StreamingSubscription, SubscriptionManager, LOG_TOPIC, RAW_TOPIC,
};
