//! IPC handler implementations.
//!
//! Each handler module contains thin handlers over the supervisor; the
//! process machinery itself lives in the `erwin` crate.

pub mod health;
pub mod process;
