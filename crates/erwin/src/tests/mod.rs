//! Integration tests for the supervision engine.
//!
//! Children are real `/bin/sh` one-liners so the pumps read genuine pipe
//! output end to end.
//!
//! Organization:
//!
//! - `harness.rs`     - shell fixtures and bounded bus-draining helpers
//! - `registry.rs`    - config registration and the auto-start sweep
//! - `events.rs`      - framing, tagging, and bus delivery
//! - `lifecycle.rs`   - closed transitions and notifications
//! - `completion.rs`  - completion hook semantics
//! - `concurrency.rs` - isolation across concurrent processes

mod completion;
mod concurrency;
mod registry;
