pub mod identity;
pub mod ingest;
pub mod m3u_parser;
pub mod metrics;
pub mod reconciler;
pub mod stream_proxy;
pub mod xtream;

pub use identity::{AdminKeyIdentity, CurrentUser, IdentityProvider};
pub use ingest::{IngestOutcome, IngestService};
pub use stream_proxy::StreamProxy;
