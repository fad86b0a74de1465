//! Prometheus metrics
//!
//! Exposed by `GET /metrics` alongside the default process registry.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, Encoder,
    IntCounterVec, IntGaugeVec, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Open relay sessions, labeled `live` or `media`
    pub static ref ACTIVE_STREAMS: IntGaugeVec = register_int_gauge_vec_with_registry!(
        "livetv_active_streams",
        "Streams currently being relayed",
        &["kind"],
        REGISTRY
    )
    .expect("Failed to register livetv_active_streams");

    /// Ingestion runs by source origin and outcome (`ok`, `upstream_failure`, `error`)
    pub static ref INGEST_RUNS: IntCounterVec = register_int_counter_vec_with_registry!(
        "livetv_ingest_runs_total",
        "Playlist ingestion runs",
        &["origin", "outcome"],
        REGISTRY
    )
    .expect("Failed to register livetv_ingest_runs_total");

    pub static ref RELAYED_BYTES: IntCounterVec = register_int_counter_vec_with_registry!(
        "livetv_relayed_bytes_total",
        "Bytes sent to clients",
        &["kind"],
        REGISTRY
    )
    .expect("Failed to register livetv_relayed_bytes_total");
}

/// Kind label of a relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Live,
    Media,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Live => "live",
            StreamKind::Media => "media",
        }
    }
}

/// Counts one open session for as long as it lives
pub struct ActiveStreamGuard {
    kind: StreamKind,
}

impl ActiveStreamGuard {
    pub fn new(kind: StreamKind) -> Self {
        ACTIVE_STREAMS.with_label_values(&[kind.as_str()]).inc();
        Self { kind }
    }

    pub fn record_bytes(&self, n: usize) {
        RELAYED_BYTES
            .with_label_values(&[self.kind.as_str()])
            .inc_by(n as u64);
    }
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        ACTIVE_STREAMS.with_label_values(&[self.kind.as_str()]).dec();
    }
}

pub fn record_ingest(origin: &str, outcome: &str) {
    INGEST_RUNS.with_label_values(&[origin, outcome]).inc();
}

/// Text exposition of the application and default registries
pub fn gather_metrics() -> Result<Vec<u8>, prometheus::Error> {
    let mut families = REGISTRY.gather();
    families.extend(prometheus::gather());

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(buffer)
}
