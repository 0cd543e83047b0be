//! peermux Runtime - Peer lifecycle and the multiplexer loop
//!
//! This crate keeps one read worker alive per resolved peer:
//! 1. Resolve the desired peer set
//! 2. Reconcile it against the active set (start new, cancel gone)
//! 3. Per peer: open stream, scan lines, forward records, retry forever
//! 4. Repeat on every tick until the root lifetime is canceled

pub mod active;
pub mod clock;
pub mod config;
pub mod multiplexer;
pub mod session;
pub mod sink;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use active::*;
pub use clock::*;
pub use config::*;
pub use multiplexer::*;
pub use session::*;
pub use sink::*;
pub use worker::*;
pub use telemetry::{init_logging, LogFormat};
