//! peermux Transport - Concrete stream openers
//!
//! This crate provides:
//! - HTTP GET stream opener (response body as the byte stream)
//! - Address to URL mapping (closures or `{addr}` templates)

pub mod http;

pub use http::*;
