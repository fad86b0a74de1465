pub mod health;
pub mod live_tv;
pub mod media;
pub mod playlists;
