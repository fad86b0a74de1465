pub mod channel;
pub mod media;
pub mod playlist;

pub use channel::{
    ChannelDescriptor, ChannelField, ChannelFilter, ChannelRecord, ChannelResponse, NewChannel,
};
pub use media::MediaRecord;
pub use playlist::{
    ConnectionDescriptor, NewPlaylist, PlaylistSource, PlaylistSummary, PlaylistType, SourceOrigin,
};
