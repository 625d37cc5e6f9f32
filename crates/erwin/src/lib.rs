//! # Erwin
//!
//! A process supervision engine. Erwin registers named commands, launches
//! them with piped output, multiplexes every child's stdout and stderr
//! onto one shared event bus as framed, tagged lines, and tracks each
//! process from running to closed.
//!
//! ## Non-negotiable principles
//!
//! - **Configs outlive processes**: a definition survives any number of
//!   starts and stops of the process it describes
//! - **One live process per name**: a second launch under a live name is
//!   rejected before it has any effect
//! - **Per-channel order is preserved**: lines from one channel arrive in
//!   the order the process wrote them; interleaving across channels or
//!   processes is unspecified
//! - **Lifecycle derives from channel ends**: a process is closed exactly
//!   when both of its channels have ended, never earlier
//! - **Slow subscribers lose their own data, nobody else's**: the buses
//!   never apply back-pressure to the output pumps
//!
//! ## Architecture
//!
//! ```text
//!   run_command ──► spawn child ──► live map entry (name → handle)
//!                        │
//!              ┌─────────┴─────────┐
//!          stdout pump         stderr pump
//!              │    raw chunks     │
//!              ├────► raw bus ◄────┤
//!              │   framed lines    │
//!              └──► event bus  ◄───┘
//!                        │
//!        both channels ended ──► entry removed, lifecycle hub
//!        fires the name's closed topic; all-closed when map drains
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use erwin::{ProcessConfig, Supervisor};
//!
//! # async fn demo() {
//! let supervisor = Supervisor::new();
//!
//! supervisor
//!     .add_process(ProcessConfig::new("web", "node").with_args(["server.js"]))
//!     .await;
//!
//! let mut events = supervisor.subscribe_events();
//! supervisor.run_configured_processes().await;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{} [{}] {}", event.name, event.stream, event.message);
//! }
//! # }
//! ```

mod channel;
pub mod config;
pub mod error;
pub mod event;
mod framing;
pub mod lifecycle;
pub mod process;
pub mod supervisor;

#[cfg(test)]
mod tests;

pub use config::ProcessConfig;
pub use error::{ErwinError, ErwinResult};
pub use event::{ProcessEvent, RawChunk, StreamKind};
pub use process::ProcessHandle;
pub use supervisor::{CompletionHook, RunOptions, Supervisor};
