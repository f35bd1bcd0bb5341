//! Process-wide metrics: a Prometheus exporter plus the counters/histogram/
//! gauge the pipeline actually emits (§10.5). Scoped to ingests
//! created/finished/warned, upload duration, in-flight uploads, and a
//! per-taxonomy error counter; this is observability, not the
//! transcoding/analysis surface the rest of the system excludes.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

use super::config::MetricsConfig;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid histogram buckets: {0}")]
    InvalidBuckets(String),
    #[error("failed to install metrics recorder: {0}")]
    InstallFailed(String),
}

pub const INGESTS_CREATED_TOTAL: &str = "zoom_ingest_ingests_created_total";
pub const INGESTS_FINISHED_TOTAL: &str = "zoom_ingest_ingests_finished_total";
pub const INGESTS_WARNED_TOTAL: &str = "zoom_ingest_ingests_warned_total";
pub const UPLOAD_DURATION_SECONDS: &str = "zoom_ingest_upload_duration_seconds";
pub const UPLOADS_IN_FLIGHT: &str = "zoom_ingest_uploads_in_flight";
pub const ERRORS_TOTAL: &str = "zoom_ingest_errors_total";

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder. Idempotent: a second call
/// returns the same handle rather than erroring, since `init_observability`
/// and test setup can both want one.
pub fn install_recorder(config: &MetricsConfig) -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(UPLOAD_DURATION_SECONDS.to_string()), &config.latency_buckets)
        .map_err(|e| MetricsError::InvalidBuckets(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    describe_metrics();
    let _ = HANDLE.set(handle.clone());
    Ok(handle)
}

/// Renders the current snapshot in Prometheus text exposition format, for
/// the `/metrics` route. `None` before `install_recorder` has run.
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

fn describe_metrics() {
    describe_counter!(INGESTS_CREATED_TOTAL, Unit::Count, "Ingests created from a webhook or manual/bulk intake");
    describe_counter!(INGESTS_FINISHED_TOTAL, Unit::Count, "Ingests that reached the FINISHED state");
    describe_counter!(INGESTS_WARNED_TOTAL, Unit::Count, "Ingests that reached the WARNING state");
    describe_histogram!(UPLOAD_DURATION_SECONDS, Unit::Seconds, "Time spent uploading a recording's files to the sink");
    describe_gauge!(UPLOADS_IN_FLIGHT, Unit::Count, "Uploads currently in progress");
    describe_counter!(ERRORS_TOTAL, Unit::Count, "Pipeline errors, labeled by taxonomy variant (§7)");
}

pub fn record_ingest_created() {
    counter!(INGESTS_CREATED_TOTAL).increment(1);
}

pub fn record_ingest_finished() {
    counter!(INGESTS_FINISHED_TOTAL).increment(1);
}

pub fn record_ingest_warned() {
    counter!(INGESTS_WARNED_TOTAL).increment(1);
}

pub fn record_upload_duration(seconds: f64) {
    histogram!(UPLOAD_DURATION_SECONDS).record(seconds);
}

pub fn upload_started() {
    gauge!(UPLOADS_IN_FLIGHT).increment(1.0);
}

pub fn upload_finished() {
    gauge!(UPLOADS_IN_FLIGHT).decrement(1.0);
}

/// `taxonomy` should be a `PipelineError` variant name, e.g. `"Transport"` or
/// `"NoMp4Files"` (§7).
pub fn record_error(taxonomy: &str) {
    counter!(ERRORS_TOTAL, "kind" => taxonomy.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_recorder_is_idempotent() {
        let config = MetricsConfig::default();
        let first = install_recorder(&config);
        let second = install_recorder(&config);
        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[test]
    fn records_do_not_panic_before_or_after_install() {
        record_ingest_created();
        record_ingest_finished();
        record_ingest_warned();
        record_upload_duration(12.5);
        upload_started();
        upload_finished();
        record_error("Transport");

        let _ = install_recorder(&MetricsConfig::default());

        record_ingest_created();
        record_error("NoMp4Files");
    }
}
