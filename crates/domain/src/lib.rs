//! # Rebound Domain
//!
//! Data types shared by every Rebound crate.
//!
//! This crate contains:
//! - Request and response values ([`RequestDescriptor`], [`RawResponse`])
//! - Transport failure tags ([`ErrorKind`], [`TransportError`])
//! - The immutable [`RetryPolicy`] and its serde-facing [`ClientConfig`]
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Rebound crates
//! - Only external dependencies allowed
//! - Pure values, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
