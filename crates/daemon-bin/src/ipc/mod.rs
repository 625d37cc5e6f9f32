//! IPC wiring for the daemon server.

pub mod handlers;
pub mod register;
