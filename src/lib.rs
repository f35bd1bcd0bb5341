//! zoom-ingest - delivers cloud-recorded meetings into an institutional
//! media platform.
//!
//! Watches a webhook intake (or takes manual/bulk requests) for finished
//! cloud recordings, downloads their files from the Source, reshapes their
//! metadata into the Sink's catalogs, and drives the Sink's multi-step
//! ingest protocol to publish them as media packages.

pub mod app;
pub mod broker;
pub mod config;
pub mod domain;
pub mod engine;
pub mod intake;
pub mod observability;
pub mod sink;
pub mod source;
pub mod storage;

pub use app::Application;
pub use config::AppConfig;
pub use domain::{strip_zero_width_space, Ingest, IngestParams, IngestStatus, PipelineError, Recording, Result, User};

/// Library version, surfaced on `/health` and in the CLI's `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes logging/tracing and the metrics recorder using the given
/// configuration. Call once, before constructing an [`Application`].
pub fn init(config: &AppConfig) -> std::result::Result<observability::ObservabilityStack, String> {
    observability::init_observability(&config.logging)
}
