//! Ambient engineering stack: logging/tracing, metrics, health and readiness
//! (§10.2, §10.4, §10.5). Kept deliberately separate from [`crate::config`]:
//! that module is the pipeline's own layered TOML+env configuration, while
//! this one is the richer, standalone shape the tracing/health subsystems
//! initialize themselves from.

pub mod config;
pub mod health;
pub mod metrics;
pub mod tracing;

pub use config::{HealthConfig, LoggingConfig, LoggingFormat, MetricsConfig, ObservabilityConfig, OtlpConfig, TracingConfig, TracingFormat};
pub use health::{CacheHealthCheck, ComponentHealth, DatabaseHealthCheck, HealthCheck, HealthChecker, HealthStatus, SystemHealth};
pub use metrics::MetricsError;
pub use self::tracing::{extract_trace_context_from_headers, CorrelationId, RequestId, TraceContext};

use std::sync::Arc;

/// Everything wired up at startup: a metrics recorder installed as the
/// global default, and a health checker ready to have components
/// registered against it.
pub struct ObservabilityStack {
    pub health: Arc<HealthChecker>,
}

/// Builds a [`TracingConfig`] from the pipeline's own (much simpler)
/// [`crate::config::LoggingConfig`], then initializes `tracing-subscriber`
/// and the Prometheus metrics recorder. Called once at process startup.
pub fn init_observability(logging: &crate::config::LoggingConfig) -> Result<ObservabilityStack, String> {
    let tracing_config = TracingConfig {
        level: logging.level.clone(),
        format: if logging.json { TracingFormat::Json } else { TracingFormat::Text },
        ..TracingConfig::default()
    };
    self::tracing::init_tracing(&tracing_config)?;

    let metrics_config = MetricsConfig::default();
    metrics::install_recorder(&metrics_config).map_err(|e| e.to_string())?;

    let health = Arc::new(HealthChecker::new(HealthConfig::default()));
    Ok(ObservabilityStack { health })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_health_checker_with_defaults() {
        let checker = HealthChecker::new(HealthConfig::default());
        let health = checker.check_health().await;
        assert_eq!(health.status, HealthStatus::Healthy);
    }
}
