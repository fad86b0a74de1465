//! Xtream Codes Integration
//!
//! An Xtream source is stored as the connection descriptor
//! ```text
//! xtream://{server}/{username}/{password}
//! ```
//! and refreshed by fetching the panel's live listing:
//! ```text
//! GET {server}/live/{username}/{password}
//! ```
//!
//! The response is a JSON array; entries are mapped to channel descriptors
//! and entries without a stream URL are skipped and counted.

pub mod client;
pub mod types;

// Re-exports for convenience
pub use client::{XtreamClient, XtreamError, XtreamFetch};
pub use types::{XtreamCredentials, XtreamLiveEntry, XTREAM_SCHEME};
