use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an [`Ingest`] (§3, §4.4).
///
/// FINISHED and WARNING are both terminal; WARNING specifically means a
/// fallback track had to be used instead of a preferred one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    New,
    InProgress,
    Finished,
    Warning,
}

impl IngestStatus {
    /// Wire-visible status string taxonomy (§6): `new | in progress | finished | warning`.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            IngestStatus::New => "new",
            IngestStatus::InProgress => "in progress",
            IngestStatus::Finished => "finished",
            IngestStatus::Warning => "warning",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestStatus::Finished | IngestStatus::Warning)
    }

    /// Encoding used in the `ingest.status` column (smallint).
    pub fn as_db_code(&self) -> i64 {
        match self {
            IngestStatus::New => 0,
            IngestStatus::InProgress => 1,
            IngestStatus::Finished => 2,
            IngestStatus::Warning => 3,
        }
    }

    pub fn from_db_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(IngestStatus::New),
            1 => Some(IngestStatus::InProgress),
            2 => Some(IngestStatus::Finished),
            3 => Some(IngestStatus::Warning),
            _ => None,
        }
    }
}

/// Serialized submission parameters for an Ingest: the Dublin Core +
/// institutional-extension fields, plus the chosen workflow/acl/series ids.
///
/// Known field names are first-class; everything else (including any
/// `eth-*` extension key not named explicitly) lives in `extra` so the
/// metadata-shaping stage (`sink::dc`) never has to guess at a schema it
/// wasn't told about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestParams {
    pub workflow_id: Option<String>,
    pub acl_id: Option<String>,
    pub series_id: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub duration: Option<i64>,
    pub creator: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl IngestParams {
    pub fn sanitized(mut self) -> Self {
        if let Some(t) = self.title.take() {
            self.title = Some(crate::domain::strip_zero_width_space(&t));
        }
        for v in self.extra.values_mut() {
            *v = crate::domain::strip_zero_width_space(v);
        }
        self
    }
}

/// A single attempt to deliver one Recording to the Sink (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingest {
    pub id: i64,
    pub uuid: String,
    pub status: IngestStatus,
    pub timestamp: DateTime<Utc>,
    pub is_webhook: bool,
    pub params: IngestParams,
    pub mediapackage_id: Option<String>,
    pub workflow_instance_id: Option<String>,
}

impl Ingest {
    pub fn new_for(uuid: impl Into<String>, is_webhook: bool, params: IngestParams) -> Self {
        Self {
            id: 0,
            uuid: uuid.into(),
            status: IngestStatus::New,
            timestamp: Utc::now(),
            is_webhook,
            params: params.sanitized(),
            mediapackage_id: None,
            workflow_instance_id: None,
        }
    }

    /// Invariant: once FINISHED, both ids are non-empty (§3, §8 invariant 3).
    pub fn finished_ids_valid(&self) -> bool {
        if self.status != IngestStatus::Finished && self.status != IngestStatus::Warning {
            return true;
        }
        matches!((&self.mediapackage_id, &self.workflow_instance_id), (Some(m), Some(w)) if !m.is_empty() && !w.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_match_taxonomy() {
        assert_eq!(IngestStatus::New.as_wire_str(), "new");
        assert_eq!(IngestStatus::InProgress.as_wire_str(), "in progress");
        assert_eq!(IngestStatus::Finished.as_wire_str(), "finished");
        assert_eq!(IngestStatus::Warning.as_wire_str(), "warning");
    }

    #[test]
    fn db_code_roundtrip() {
        for s in [
            IngestStatus::New,
            IngestStatus::InProgress,
            IngestStatus::Finished,
            IngestStatus::Warning,
        ] {
            assert_eq!(IngestStatus::from_db_code(s.as_db_code()), Some(s));
        }
    }

    #[test]
    fn new_ingest_defaults_to_new_status() {
        let ingest = Ingest::new_for("abc==", true, IngestParams::default());
        assert_eq!(ingest.status, IngestStatus::New);
        assert!(ingest.finished_ids_valid());
    }

    #[test]
    fn finished_without_ids_is_invalid() {
        let mut ingest = Ingest::new_for("abc==", true, IngestParams::default());
        ingest.status = IngestStatus::Finished;
        assert!(!ingest.finished_ids_valid());
        ingest.mediapackage_id = Some("mp1".into());
        ingest.workflow_instance_id = Some("wf1".into());
        assert!(ingest.finished_ids_valid());
    }

    #[test]
    fn params_sanitize_strips_zwsp_from_title_and_extra() {
        let mut params = IngestParams::default();
        params.title = Some("Lecture\u{200b}".into());
        params.extra.insert("eth-advertised".into(), "on\u{200b}".into());
        let sanitized = params.sanitized();
        assert_eq!(sanitized.title.unwrap(), "Lecture");
        assert_eq!(sanitized.extra.get("eth-advertised").unwrap(), "on");
    }
}
