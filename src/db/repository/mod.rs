//! Database repositories
//!
//! Repository pattern for database access, separating data access logic
//! from business logic.

pub mod channels;
pub mod media;
pub mod playlists;

// Re-export commonly used items
pub use channels::ChannelCopyWriter;
