//! Application wiring: constructs every collaborator from configuration and
//! exposes the handful of entry points the CLI drives (§9: explicit
//! construction, no global singletons or cyclic back-references).

use std::sync::Arc;

use reqwest::Client;
use tracing::{error, info, warn};

use crate::broker::{BrokerBridge, BrokerError};
use crate::config::AppConfig;
use crate::domain::{IngestParams, PipelineError, Result};
use crate::engine::{Engine, Reaper};
use crate::intake::{router, IntakeHandler, IntakeState};
use crate::observability::{CacheHealthCheck, DatabaseHealthCheck, HealthChecker, ObservabilityStack};
use crate::sink::{AuthedHttp, CatalogCache, SinkAdapter};
use crate::source::SourceClient;
use crate::storage::{Repository, SqlitePool};

pub struct Application {
    pub config: Arc<AppConfig>,
    pub repo: Arc<Repository>,
    pub broker: Arc<BrokerBridge>,
    pub source: Arc<SourceClient>,
    pub sink: Arc<SinkAdapter>,
    pub engine: Engine,
    pub intake: Arc<IntakeHandler>,
    pub health: Arc<HealthChecker>,
}

impl Application {
    /// Wires every collaborator from `config`: the sqlite pool (migrated),
    /// the broker connection, the Source and Sink adapters, and the
    /// observability stack. Each is passed explicitly to what needs it
    /// rather than reached through a global.
    pub async fn bootstrap(config: AppConfig) -> Result<(Self, ObservabilityStack)> {
        let config = Arc::new(config);

        let observability = crate::init(&config).map_err(PipelineError::Config)?;

        if config.database.is_default() {
            warn!("no database.database configured, falling back to a local sqlite file; set it explicitly in production");
        }
        let pool = SqlitePool::connect(&config.database.database).await?;
        pool.run_migrations().await?;
        let repo = Arc::new(Repository::new(pool));

        let broker = Arc::new(BrokerBridge::connect(&config.rabbit).await.map_err(PipelineError::from)?);

        let source = Arc::new(SourceClient::with_repository(&config.zoom, Some(repo.clone())).map_err(PipelineError::from)?);

        let http_client = Client::builder().build().map_err(|e| PipelineError::Config(e.to_string()))?;
        let authed_http =
            Arc::new(AuthedHttp::new(http_client, config.opencast.url.clone(), config.opencast.user.clone(), config.opencast.password.clone()));
        let catalog = CatalogCache::new(authed_http.clone(), &config.opencast.workflow_filter, &config.opencast.series_filter)
            .map_err(PipelineError::from)?;
        let sink = Arc::new(SinkAdapter::new(authed_http, catalog));

        let engine = Engine::new(config.clone(), source.clone(), sink.clone(), repo.clone());
        let intake = Arc::new(IntakeHandler::new(config.clone(), source.clone(), repo.clone(), broker.clone()));

        observability.health.register(Arc::new(DatabaseHealthCheck::new("database", repo.clone(), true))).await;
        observability.health.register(Arc::new(CacheHealthCheck::new("opencast_catalog_cache", sink.clone(), false))).await;

        info!("application bootstrapped");
        Ok((Self { config, repo, broker, source, sink, engine, intake, health: observability.health.clone() }, observability))
    }

    /// Serves the intake HTTP surface, the worker pool that drains the
    /// broker queue, and the reaper, until the process is terminated or the
    /// listener fails.
    pub async fn serve(&self, bind_addr: &str) -> Result<()> {
        let state = IntakeState { handler: self.intake.clone(), health: self.health.clone() };
        let app_router = router(state);

        let reaper = Reaper::new(self.repo.clone(), self.broker.clone(), self.config.engine.clone());
        let reaper_handle = tokio::spawn(async move { reaper.run().await });

        let worker_handles: Vec<_> = (0..self.config.engine.worker_pool_size.max(1))
            .map(|worker_id| {
                let engine = self.engine.clone();
                let broker = self.broker.clone();
                tokio::spawn(async move {
                    let consumer_tag = format!("zoom-ingest-worker-{worker_id}");
                    let result = broker
                        .consume(&consumer_tag, |notification| {
                            let engine = engine.clone();
                            async move { engine.process(notification.ingest_id).await.map_err(|e| BrokerError::Handler(e.to_string())) }
                        })
                        .await;
                    if let Err(e) = result {
                        error!(worker_id, error = %e, "worker consume loop exited");
                    }
                })
            })
            .collect();

        let listener = tokio::net::TcpListener::bind(bind_addr).await.map_err(|e| PipelineError::Transport(e.to_string()))?;
        info!(addr = %bind_addr, "intake server listening");
        axum::serve(listener, app_router).await.map_err(|e| PipelineError::Transport(e.to_string()))?;

        reaper_handle.abort();
        for handle in worker_handles {
            handle.abort();
        }
        Ok(())
    }

    /// Runs a single manual ingest by uuid (CLI `ingest-manual`).
    pub async fn ingest_manual(&self, uuid: &str, params: IngestParams, dur_check: bool) -> Result<i64> {
        let ingest = self.intake.ingest_manual(uuid, params, dur_check).await?;
        Ok(ingest.id)
    }

    /// Runs one ingest per uuid in `uuids` (CLI `ingest-bulk`), returning
    /// per-uuid results so the caller can report a summary without aborting
    /// on the first failure.
    pub async fn ingest_bulk(&self, uuids: &[String], params: IngestParams, dur_check: bool) -> Vec<(String, Result<i64>)> {
        self.intake.ingest_bulk(uuids, params, dur_check).await.into_iter().map(|(uuid, result)| (uuid, result.map(|i| i.id))).collect()
    }
}
