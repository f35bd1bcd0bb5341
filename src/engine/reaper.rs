//! Reaper: a periodic task that notices Ingest rows stuck in NEW for too
//! long — a lost or never-delivered broker message — and republishes them
//! so a worker picks them back up (§4.4). IN_PROGRESS rows are
//! deliberately left alone: a crash mid-upload needs an operator's
//! judgment, not an automatic retry that might race a live worker.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::broker::{BrokerBridge, IngestNotification};
use crate::config::EngineConfig;
use crate::domain::Result;
use crate::storage::Repository;

pub struct Reaper {
    repo: Arc<Repository>,
    broker: Arc<BrokerBridge>,
    config: EngineConfig,
}

impl Reaper {
    pub fn new(repo: Arc<Repository>, broker: Arc<BrokerBridge>, config: EngineConfig) -> Self {
        Self { repo, broker, config }
    }

    /// Runs forever, ticking every `reaper_interval_secs`.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.reaper_interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                warn!(error = %e, "reaper tick failed");
            }
        }
    }

    async fn tick(&self) -> Result<()> {
        let stuck = self.repo.reapable_ingests(self.config.reaper_threshold_secs).await?;
        for ingest in &stuck {
            info!(ingest_id = ingest.id, uuid = %ingest.uuid, "reaping stuck ingest, republishing");
            if let Err(e) = self.broker.publish(&IngestNotification { uuid: ingest.uuid.clone(), ingest_id: ingest.id }).await {
                warn!(ingest_id = ingest.id, error = %e, "failed to republish reaped ingest");
            }
        }
        Ok(())
    }
}
