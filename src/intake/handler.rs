//! Webhook intake and manual/bulk ingest creation (§4.1).

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::broker::{BrokerBridge, IngestNotification};
use crate::config::AppConfig;
use crate::domain::{Ingest, IngestParams, PipelineError, Recording, Result};
use crate::observability::metrics;
use crate::source::{validate_recording_object, validate_recording_payload, validate_renamed, RecordingObject, SourceClient, WebhookBody};
use crate::storage::Repository;

/// What happened to an inbound webhook event, for the HTTP layer to turn
/// into a status code and for audit logging.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeOutcome {
    /// A new Ingest row was created and queued.
    Created { ingest_id: i64, uuid: String },
    /// A webhook-Ingest already existed for this uuid; nothing new was
    /// enqueued (§4.1 dedup gate).
    AlreadyCreated { ingest_id: i64, uuid: String },
    /// The event was well-formed but didn't pass the topic filter; no
    /// Ingest was created.
    Filtered(String),
    /// Duration (minutes) fell below the configured minimum; no Ingest was
    /// created.
    TooShort(String),
    /// Webhook ingest is globally disabled (no default workflow/series/acl
    /// configured); no Ingest was created.
    Disabled,
    /// An event this pipeline doesn't act on, or a rename that found an
    /// active Ingest already in flight and stopped there.
    Ignored(String),
}

pub struct IntakeHandler {
    config: Arc<AppConfig>,
    source: Arc<SourceClient>,
    repo: Arc<Repository>,
    broker: Arc<BrokerBridge>,
}

impl IntakeHandler {
    pub fn new(config: Arc<AppConfig>, source: Arc<SourceClient>, repo: Arc<Repository>, broker: Arc<BrokerBridge>) -> Self {
        Self { config, source, repo, broker }
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.config.webhook.secret.as_deref()
    }

    pub async fn handle_webhook(&self, payload: Value) -> Result<IntakeOutcome> {
        let body: WebhookBody = serde_json::from_value(payload.clone()).map_err(|e| PipelineError::BadWebhookData(e.to_string()))?;

        match body.event.as_str() {
            "recording.completed" => self.handle_recording_completed(&body.payload).await,
            "recording.renamed" => self.handle_recording_renamed(&body.payload).await,
            other => {
                info!(event = other, "ignoring unhandled webhook event");
                Ok(IntakeOutcome::Ignored(other.to_string()))
            }
        }
    }

    async fn handle_recording_completed(&self, payload: &Value) -> Result<IntakeOutcome> {
        validate_recording_payload(payload).map_err(PipelineError::from)?;
        let object_value = payload.get("object").expect("checked by validate_recording_payload");
        let object = validate_recording_object(object_value).map_err(PipelineError::from)?;
        self.process_completed_recording(object, true).await
    }

    /// Shared by a fresh `recording.completed` webhook and by a rename that
    /// falls through to re-processing as a completion (§4.1).
    async fn process_completed_recording(&self, object: RecordingObject, is_webhook: bool) -> Result<IntakeOutcome> {
        let topic_regex = regex::Regex::new(&self.config.filter.topic_regex).map_err(|e| PipelineError::Config(e.to_string()))?;
        if is_webhook && !topic_regex.is_match(&object.topic) {
            return Ok(IntakeOutcome::Filtered(format!("topic '{}' did not match filter: dropped by filter", object.topic)));
        }

        if !self.config.webhook.webhook_ingest_enabled() {
            warn!(uuid = %object.uuid, "webhook ingest is disabled, no default workflow/series/acl configured");
            return Ok(IntakeOutcome::Disabled);
        }

        if object.duration < self.config.webhook.min_duration {
            return Ok(IntakeOutcome::TooShort(format!("duration {} below minimum {}: too short", object.duration, self.config.webhook.min_duration)));
        }

        if let Some(existing) = self.repo.get_webhook_ingest_by_uuid(&object.uuid).await? {
            info!(uuid = %existing.uuid, ingest_id = existing.id, "webhook-ingest already created for this uuid");
            return Ok(IntakeOutcome::AlreadyCreated { ingest_id: existing.id, uuid: existing.uuid });
        }

        let start_time = chrono::DateTime::parse_from_rfc3339(&object.start_time)
            .map_err(|e| PipelineError::BadWebhookData(format!("invalid start_time: {e}")))?
            .with_timezone(&chrono::Utc);

        let recording = Recording::new(object.uuid.clone(), object.host_id.clone(), object.topic.clone(), start_time, object.duration);
        self.repo.upsert_recording(&recording).await?;

        let params = IngestParams {
            workflow_id: self.config.webhook.default_workflow_id.clone(),
            acl_id: self.config.webhook.default_acl_id.clone(),
            series_id: self.config.webhook.default_series_id.clone(),
            title: Some(object.topic.clone()),
            date: Some(object.start_time.clone()),
            duration: Some(object.duration),
            ..Default::default()
        };

        let ingest = Ingest::new_for(object.uuid.clone(), true, params);
        let saved = self.repo.create_ingest(&ingest).await?;
        metrics::record_ingest_created();

        self.broker
            .publish(&IngestNotification { uuid: saved.uuid.clone(), ingest_id: saved.id })
            .await
            .map_err(PipelineError::from)?;

        info!(uuid = %saved.uuid, ingest_id = saved.id, "created ingest from webhook");
        Ok(IntakeOutcome::Created { ingest_id: saved.id, uuid: saved.uuid })
    }

    /// `recording.renamed` updates the Recording's title in place. If no
    /// active (webhook) Ingest exists for the uuid yet, the rename is
    /// treated as the pipeline's first notice of this recording and falls
    /// through to re-fetching it from the Source and processing it as a
    /// completion; otherwise it just acknowledges and stops (§4.1).
    async fn handle_recording_renamed(&self, payload: &Value) -> Result<IntakeOutcome> {
        let (_old, new) = validate_renamed(payload).map_err(PipelineError::from)?;
        if let Some(mut recording) = self.repo.get_recording_by_uuid(&new.uuid).await? {
            recording.title = crate::domain::strip_zero_width_space(&new.topic);
            self.repo.upsert_recording(&recording).await?;
            info!(uuid = %new.uuid, "applied recording rename");
        }

        if self.repo.get_webhook_ingest_by_uuid(&new.uuid).await?.is_some() {
            info!(uuid = %new.uuid, "active ingest already exists for renamed recording, acknowledging");
            return Ok(IntakeOutcome::Ignored("recording.renamed".to_string()));
        }

        info!(uuid = %new.uuid, "no active ingest for renamed recording, re-fetching and processing as completion");
        let object = self.source.get_recording(&new.uuid).await.map_err(PipelineError::from)?;
        self.process_completed_recording(object, true).await
    }

    /// Manual single-uuid ingest (CLI `ingest-manual`): fetches the
    /// recording from the Source directly rather than waiting on a webhook.
    /// Unlike the webhook path, `dur_check` lets the caller decide whether
    /// the minimum-duration gate applies at all (§4.1).
    pub async fn ingest_manual(&self, uuid: &str, params: IngestParams, dur_check: bool) -> Result<Ingest> {
        let object = self.source.get_recording(uuid).await.map_err(PipelineError::from)?;

        if dur_check && object.duration < self.config.webhook.min_duration {
            return Err(PipelineError::BadWebhookData(format!(
                "duration {} below minimum {}: too short",
                object.duration, self.config.webhook.min_duration
            )));
        }

        let start_time = chrono::DateTime::parse_from_rfc3339(&object.start_time)
            .map_err(|e| PipelineError::BadWebhookData(format!("invalid start_time: {e}")))?
            .with_timezone(&chrono::Utc);

        let recording = Recording::new(object.uuid.clone(), object.host_id.clone(), object.topic.clone(), start_time, object.duration);
        self.repo.upsert_recording(&recording).await?;

        let ingest = Ingest::new_for(object.uuid.clone(), false, params);
        let saved = self.repo.create_ingest(&ingest).await?;
        metrics::record_ingest_created();

        self.broker
            .publish(&IngestNotification { uuid: saved.uuid.clone(), ingest_id: saved.id })
            .await
            .map_err(PipelineError::from)?;

        Ok(saved)
    }

    /// Bulk ingest (CLI `ingest-bulk`): one [`ingest_manual`] call per uuid,
    /// continuing past individual failures so one bad row doesn't abort the
    /// whole file.
    pub async fn ingest_bulk(&self, uuids: &[String], params: IngestParams, dur_check: bool) -> Vec<(String, Result<Ingest>)> {
        let mut results = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            let result = self.ingest_manual(uuid, params.clone(), dur_check).await;
            if let Err(ref e) = result {
                warn!(uuid = %uuid, error = %e, "bulk ingest entry failed");
            }
            results.push((uuid.clone(), result));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_variants_are_distinguishable() {
        assert_ne!(IntakeOutcome::Disabled, IntakeOutcome::Ignored("x".into()));
        assert_ne!(
            IntakeOutcome::Created { ingest_id: 1, uuid: "a".into() },
            IntakeOutcome::AlreadyCreated { ingest_id: 1, uuid: "a".into() }
        );
        assert_eq!(
            IntakeOutcome::Created { ingest_id: 1, uuid: "a".into() },
            IntakeOutcome::Created { ingest_id: 1, uuid: "a".into() }
        );
    }
}
