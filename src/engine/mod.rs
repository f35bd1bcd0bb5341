//! Ingest Engine: drives one Ingest from NEW to a terminal state by
//! downloading the chosen track from the Source and running it through the
//! Sink's multi-step ingest protocol (§4.3, §4.4). On any failure the whole
//! attempt is abandoned and retried from a fresh `createMediaPackage` next
//! time — there is no resuming mid-protocol, since Opencast mediapackages
//! are cheap to discard.

mod reaper;
mod tracks;

pub use reaper::Reaper;
pub use tracks::{find_chat_file, select_track, TrackSelection};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::domain::{Ingest, IngestStatus, PipelineError, Result};
use crate::observability::metrics;
use crate::sink::{build_episode_dc, build_episode_policy, build_ethterms_dc, extract_mediapackage_id, SinkAdapter, UploadFile};
use crate::source::SourceClient;
use crate::storage::Repository;

/// One worker's view of the pipeline's collaborators. Cloned cheaply (every
/// field is an `Arc`) into each spawned worker task (§5).
#[derive(Clone)]
pub struct Engine {
    config: Arc<AppConfig>,
    source: Arc<SourceClient>,
    sink: Arc<SinkAdapter>,
    repo: Arc<Repository>,
}

impl Engine {
    pub fn new(config: Arc<AppConfig>, source: Arc<SourceClient>, sink: Arc<SinkAdapter>, repo: Arc<Repository>) -> Self {
        Self { config, source, sink, repo }
    }

    /// Processes one Ingest to completion. A retryable failure returns the
    /// Ingest to NEW so a later broker redelivery or the reaper picks it
    /// back up; §4.4 has no FAILED state, only FINISHED and WARNING are
    /// terminal, so a non-retryable failure also returns it to NEW but is
    /// logged loudly and counted so an operator can find it.
    #[instrument(skip(self))]
    pub async fn process(&self, ingest_id: i64) -> Result<()> {
        let ingest = self.repo.get_ingest(ingest_id).await?.ok_or_else(|| PipelineError::NotFound(format!("ingest {ingest_id}")))?;

        if ingest.status.is_terminal() {
            info!(ingest_id, "ingest already terminal, skipping");
            return Ok(());
        }

        self.repo.transition_ingest(ingest.id, IngestStatus::InProgress, None, None).await?;

        match self.run(&ingest).await {
            Ok((mediapackage_id, workflow_instance_id, used_fallback)) => {
                let status = if used_fallback { IngestStatus::Warning } else { IngestStatus::Finished };
                self.repo.transition_ingest(ingest.id, status, Some(&mediapackage_id), Some(&workflow_instance_id)).await?;
                if status == IngestStatus::Warning {
                    metrics::record_ingest_warned();
                } else {
                    metrics::record_ingest_finished();
                }
                info!(ingest_id, status = status.as_wire_str(), "ingest complete");
                Ok(())
            }
            Err(e) => {
                metrics::record_error(e.taxonomy());
                warn!(ingest_id, error = %e, retryable = e.is_retryable(), "ingest attempt failed");
                if !e.is_retryable() && self.config.email.enabled {
                    tracing::error!(target: "email_notifier", ingest_id, uuid = %ingest.uuid, error = %e, "critical ingest failure routed to mail log");
                }
                self.repo.transition_ingest(ingest.id, IngestStatus::New, None, None).await?;
                Err(e)
            }
        }
    }

    async fn run(&self, ingest: &Ingest) -> Result<(String, String, bool)> {
        let object = self.source.get_recording(&ingest.uuid).await.map_err(PipelineError::from)?;

        let selection = select_track(&object.recording_files)?;
        let chat_file = find_chat_file(&object.recording_files);
        let token = self.source.download_token().map_err(PipelineError::from)?;

        let work_dir = self.prepare_work_dir(&ingest.uuid).await?;
        let video_path = work_dir.join(sanitize_file_name(&selection.file.id));
        download_with_resume(&selection.file.download_url, &token, &video_path, selection.file.file_size as u64).await?;

        let chat_path = if let Some(chat) = chat_file {
            let path = work_dir.join(format!("{}.TXT", sanitize_file_name(&chat.id)));
            download_with_resume(&chat.download_url, &token, &path, chat.file_size as u64).await?;
            Some(path)
        } else {
            None
        };

        let mp_xml = self.sink.create_media_package().await.map_err(PipelineError::from)?;
        let mediapackage_id = extract_mediapackage_id(&mp_xml).map_err(PipelineError::from)?;

        let episode_dc = build_episode_dc(
            ingest.params.title.as_deref().unwrap_or(&object.topic),
            ingest.params.creator.as_deref(),
            ingest.params.date.as_deref(),
            ingest.params.duration,
            &ingest.params.extra,
        )
        .map_err(PipelineError::from)?;
        let mp_xml = self.sink.add_dc_catalog(&mp_xml, "dublincore/episode", &episode_dc).await.map_err(PipelineError::from)?;

        let mp_xml = if let Some(ethterms) = build_ethterms_dc(&ingest.params.extra).map_err(PipelineError::from)? {
            self.sink.add_dc_catalog(&mp_xml, "ethterms/episode", &ethterms).await.map_err(PipelineError::from)?
        } else {
            mp_xml
        };

        let mp_xml = if let Some(acl_id) = ingest.params.acl_id.as_deref() {
            let acl = self.sink.catalog.get_single_acl(acl_id).await.map_err(PipelineError::from)?;
            let acl = acl.ok_or_else(|| PipelineError::NotFound(format!("acl {acl_id}")))?;
            let policy_xml = build_episode_policy(&mediapackage_id, &acl.entries).map_err(PipelineError::from)?;
            let policy_path = work_dir.join("episode-security.xml");
            tokio::fs::write(&policy_path, &policy_xml).await.map_err(|e| PipelineError::FileMissing(e.to_string()))?;
            let attachment = UploadFile { path: &policy_path, file_name: "security.xml".to_string(), content_type: "text/xml" };
            self.sink.add_attachment(&mp_xml, "security/xacml+episode", attachment).await.map_err(PipelineError::from)?
        } else {
            mp_xml
        };

        let mp_xml = if let Some(chat_path) = chat_path.as_deref() {
            let attachment = UploadFile { path: chat_path, file_name: "chat.txt".to_string(), content_type: "text/plain" };
            self.sink.add_attachment(&mp_xml, "chat/transcript", attachment).await.map_err(PipelineError::from)?
        } else {
            mp_xml
        };

        let track = UploadFile { path: &video_path, file_name: basename(&selection.file.id), content_type: "video/mp4" };
        let mp_xml = self.sink.add_track(&mp_xml, "presentation/source", track).await.map_err(PipelineError::from)?;

        let workflow_id = ingest
            .params
            .workflow_id
            .clone()
            .ok_or_else(|| PipelineError::BadWebhookData("ingest is missing a workflow id".to_string()))?;

        metrics::upload_started();
        let start = Instant::now();
        let ingest_result = self.sink.ingest(&mp_xml, &workflow_id).await.map_err(PipelineError::from);
        metrics::record_upload_duration(start.elapsed().as_secs_f64());
        metrics::upload_finished();
        let (mediapackage_id, workflow_instance_id) = ingest_result?;

        self.cleanup_work_dir(&work_dir).await;
        Ok((mediapackage_id, workflow_instance_id, selection.used_fallback))
    }

    async fn prepare_work_dir(&self, uuid: &str) -> Result<PathBuf> {
        let dir = Path::new(&self.config.engine.in_progress_root).join(sanitize_file_name(uuid));
        tokio::fs::create_dir_all(&dir).await.map_err(|e| PipelineError::FileMissing(e.to_string()))?;
        Ok(dir)
    }

    async fn cleanup_work_dir(&self, dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "failed to clean up in-progress directory");
        }
    }
}

fn sanitize_file_name(raw: &str) -> String {
    raw.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' }).collect()
}

/// The Sink's `addTrack` step must receive only the basename of the local
/// path (§8 Boundary behaviors), since a recording file id may itself
/// contain `/`.
fn basename(raw: &str) -> String {
    Path::new(raw).file_name().and_then(|n| n.to_str()).map(sanitize_file_name).unwrap_or_else(|| sanitize_file_name(raw))
}

/// Downloads `url` to `dest`, resuming from a partial file if one already
/// exists, and errors with `SizeMismatch` if the final size doesn't match
/// `expected_size` exactly (§4.4).
#[instrument(skip(bearer_token))]
pub async fn download_with_resume(url: &str, bearer_token: &str, dest: &Path, expected_size: u64) -> Result<()> {
    let already_have = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);

    if already_have == expected_size && expected_size > 0 {
        return Ok(());
    }

    let client = reqwest::Client::new();
    let mut request = client.get(url).bearer_auth(bearer_token);
    if already_have > 0 && already_have < expected_size {
        request = request.header(reqwest::header::RANGE, format!("bytes={already_have}-"));
    }

    let response = request.send().await.map_err(|e| PipelineError::Transport(e.to_string()))?;
    if !response.status().is_success() && response.status().as_u16() != 206 {
        return Err(PipelineError::Transport(format!("download returned {}", response.status())));
    }

    let resuming = already_have > 0 && response.status().as_u16() == 206;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(resuming)
        .write(true)
        .truncate(!resuming)
        .open(dest)
        .await
        .map_err(|e| PipelineError::FileMissing(e.to_string()))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PipelineError::Transport(e.to_string()))?;
        file.write_all(&chunk).await.map_err(|e| PipelineError::FileMissing(e.to_string()))?;
    }
    file.flush().await.map_err(|e| PipelineError::FileMissing(e.to_string()))?;

    let final_size = tokio::fs::metadata(dest).await.map_err(|e| PipelineError::FileMissing(e.to_string()))?.len();
    if final_size != expected_size {
        return Err(PipelineError::SizeMismatch { expected: expected_size, found: final_size });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_unsafe_characters_in_file_names() {
        assert_eq!(sanitize_file_name("a/b//c==1"), "a_b__c__1");
    }

    #[test]
    fn leaves_safe_characters_untouched() {
        assert_eq!(sanitize_file_name("abc-123_def.mp4"), "abc-123_def.mp4");
    }

    #[test]
    fn basename_strips_any_directory_components() {
        assert_eq!(basename("a/b/file-id"), "file-id");
        assert_eq!(basename("plain-id"), "plain-id");
    }
}
