//! peermux Core - Fundamental types and collaborator traits
//!
//! This crate defines the types shared by every peermux crate:
//! - Peer addresses and records
//! - Error taxonomy (cancellation vs. retryable failure)
//! - Collaborator traits (peer resolution, stream opening, byte streams)

pub mod error;
pub mod peer;
pub mod record;
pub mod stream;

pub use error::*;
pub use peer::*;
pub use record::*;
pub use stream::*;

pub use tokio_util::sync::CancellationToken;
