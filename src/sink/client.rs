//! Sink Adapter: the strictly-sequential multi-step upload protocol
//! (§4.3) plus series creation. Catalog freshness lives in [`super::catalog::CatalogCache`].

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tokio::io::AsyncRead;
use tracing::{debug, instrument};

use super::catalog::CatalogCache;
use super::error::{SinkError, SinkResult};
use super::http::AuthedHttp;
use super::mediapackage::{extract_workflow_ids, validate_mediapackage_xml};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

pub struct SinkAdapter {
    http: Arc<AuthedHttp>,
    pub catalog: CatalogCache,
}

/// A file to attach or ingest as a track, paired with the content type the
/// Sink expects explicitly set on its multipart part (§4.3).
pub struct UploadFile<'a> {
    pub path: &'a Path,
    pub file_name: String,
    pub content_type: &'static str,
}

impl SinkAdapter {
    pub fn new(http: Arc<AuthedHttp>, catalog: CatalogCache) -> Self {
        Self { http, catalog }
    }

    #[instrument(skip(self))]
    pub async fn create_media_package(&self) -> SinkResult<String> {
        let text = self.http.get_text("/ingest/createMediaPackage").await?;
        validate_mediapackage_xml(&text)?;
        Ok(text)
    }

    #[instrument(skip(self, mp_xml, dc_xml))]
    pub async fn add_dc_catalog(&self, mp_xml: &str, flavor: &str, dc_xml: &str) -> SinkResult<String> {
        let form = Form::new()
            .text("mediaPackage", mp_xml.to_string())
            .text("flavor", flavor.to_string())
            .part("dublinCore", Part::text(dc_xml.to_string()).mime_str("text/xml").map_err(SinkError::Http)?);

        let response = self.http.post_builder("/ingest/addDCCatalog").await?.multipart(form).send().await?;
        let text = response_text_or_err(response).await?;
        validate_mediapackage_xml(&text)?;
        Ok(text)
    }

    #[instrument(skip(self, mp_xml))]
    pub async fn add_attachment(&self, mp_xml: &str, flavor: &str, file: UploadFile<'_>) -> SinkResult<String> {
        let form = Form::new()
            .text("mediaPackage", mp_xml.to_string())
            .text("flavor", flavor.to_string())
            .part("BODY", self.streamed_part(&file).await?);

        let response = self.http.post_builder("/ingest/addAttachment").await?.multipart(form).send().await?;
        let text = response_text_or_err(response).await?;
        validate_mediapackage_xml(&text)?;
        Ok(text)
    }

    #[instrument(skip(self, mp_xml))]
    pub async fn add_track(&self, mp_xml: &str, flavor: &str, file: UploadFile<'_>) -> SinkResult<String> {
        let form = Form::new()
            .text("mediaPackage", mp_xml.to_string())
            .text("flavor", flavor.to_string())
            .part("BODY", self.streamed_part(&file).await?);

        let response = self.http.post_builder("/ingest/addTrack").await?.multipart(form).send().await?;
        let text = response_text_or_err(response).await?;
        validate_mediapackage_xml(&text)?;
        Ok(text)
    }

    #[instrument(skip(self, mp_xml))]
    pub async fn ingest(&self, mp_xml: &str, workflow_id: &str) -> SinkResult<(String, String)> {
        let form = Form::new().text("mediaPackage", mp_xml.to_string());
        let path = format!("/ingest/ingest/{workflow_id}");
        let response = self.http.post_builder(&path).await?.multipart(form).send().await?;
        let text = response_text_or_err(response).await?;
        extract_workflow_ids(&text)
    }

    /// `POST /api/series` with `{metadata, acl, theme?}`; 201 on success,
    /// anything else is an `OpencastError`.
    #[instrument(skip(self, metadata_xml))]
    pub async fn create_series(&self, metadata_xml: &str, acl_json: &Value, theme: Option<&str>) -> SinkResult<String> {
        let mut body = json!({ "metadata": metadata_xml, "acl": acl_json });
        if let Some(theme) = theme {
            body["theme"] = json!(theme);
        }
        let response = self.http.post_builder("/api/series").await?.json(&body).send().await?;
        if response.status().as_u16() != 201 {
            return Err(SinkError::OpencastError(format!("series creation returned {}", response.status())));
        }
        let created: Value = response.json().await?;
        created
            .get("identifier")
            .or_else(|| created.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SinkError::OpencastError("series creation response missing identifier".into()))
    }

    #[instrument(skip(self, ethterms_xml))]
    pub async fn put_series_ethterms(&self, series_id: &str, ethterms_xml: &str) -> SinkResult<()> {
        let path = format!("/series/{series_id}/elements/ethterms");
        let response = self
            .http
            .put_builder(&path)
            .await?
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(ethterms_xml.to_string())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SinkError::OpencastError(format!("series ethterms update returned {}", response.status())));
        }
        Ok(())
    }

    async fn streamed_part(&self, file: &UploadFile<'_>) -> SinkResult<Part> {
        let handle = tokio::fs::File::open(file.path).await?;
        let total_size = handle.metadata().await?.len();
        let label = file.file_name.clone();
        let body = reqwest::Body::wrap_stream(progress_stream(handle, total_size, label));
        Part::stream(body)
            .file_name(file.file_name.clone())
            .mime_str(file.content_type)
            .map_err(SinkError::Http)
    }
}

async fn response_text_or_err(response: reqwest::Response) -> SinkResult<String> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(SinkError::OpencastError(format!("sink returned {status}: {text}")));
    }
    Ok(text)
}

/// Reads `handle` in fixed-size chunks, emitting a debug log at each new
/// integer multiple of 5% of `total_size` uploaded (§4.3).
fn progress_stream(mut handle: tokio::fs::File, total_size: u64, label: String) -> impl Stream<Item = std::io::Result<Bytes>> {
    let mut read_so_far: u64 = 0;
    let mut last_logged_pct: u64 = 0;

    stream::poll_fn(move |cx| {
        use std::pin::Pin;
        use std::task::Poll;

        let mut chunk = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut read_buf = tokio::io::ReadBuf::new(&mut chunk);

        match Pin::new(&mut handle).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    return Poll::Ready(None);
                }
                read_so_far += n as u64;
                if total_size > 0 {
                    let pct = (read_so_far * 100) / total_size;
                    let bucket = pct - (pct % 5);
                    if bucket > last_logged_pct {
                        last_logged_pct = bucket;
                        debug!(file = %label, bucket, bytes = read_so_far, total = total_size, "upload progress");
                    }
                }
                chunk.truncate(n);
                Poll::Ready(Some(Ok(Bytes::from(chunk))))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Pending => Poll::Pending,
        }
    })
}